use std::{collections::HashMap, fs, path::Path};

use crate::error::{OcrDataError, Result};

/// Character table where the 0-based line number of each entry is its id.
///
/// Characters missing from the table map to `blank_id`, which is independent
/// of the table positions.
#[derive(Clone, Debug)]
pub struct VocabularyTable {
    char_to_id: HashMap<String, i32>,
    id_to_char: Vec<String>,
    blank_id: i32,
}

impl VocabularyTable {
    pub fn load<P: AsRef<Path>>(path: P, blank_id: i32) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            OcrDataError::config(format!(
                "failed to read vocabulary table '{}': {}",
                path.display(),
                e
            ))
        })?;

        let table = Self::from_entries(content.lines(), blank_id)?;
        tracing::debug!(
            "vocabulary loaded from {}: {} entries, blank_id={}",
            path.display(),
            table.len(),
            blank_id
        );

        Ok(table)
    }

    pub fn from_entries<I, S>(entries: I, blank_id: i32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut char_to_id = HashMap::new();
        let mut id_to_char = Vec::new();

        for (idx, entry) in entries.into_iter().enumerate() {
            let entry = entry.as_ref();
            let id = i32::try_from(idx)
                .map_err(|_| OcrDataError::config("vocabulary table has too many entries"))?;
            // empty lines hold their id slot but can never be looked up
            if !entry.is_empty() {
                if let Some(previous) = char_to_id.insert(entry.to_string(), id) {
                    return Err(OcrDataError::config(format!(
                        "duplicate vocabulary entry '{}' on lines {} and {}",
                        entry, previous, id
                    )));
                }
            }
            id_to_char.push(entry.to_string());
        }

        Ok(Self {
            char_to_id,
            id_to_char,
            blank_id,
        })
    }

    /// Id of `ch`, or `blank_id` when the table does not contain it.
    pub fn lookup(&self, ch: &str) -> i32 {
        self.char_to_id.get(ch).copied().unwrap_or(self.blank_id)
    }

    pub fn reverse(&self, id: i64) -> Result<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.id_to_char.get(idx))
            .map(String::as_str)
            .ok_or(OcrDataError::LookupMiss(id))
    }

    /// Maps every unicode character of `label` to its id, in order.
    pub fn encode(&self, label: &str) -> Vec<i32> {
        let mut buf = [0u8; 4];
        label
            .chars()
            .map(|ch| self.lookup(ch.encode_utf8(&mut buf)))
            .collect()
    }

    pub fn blank_id(&self) -> i32 {
        self.blank_id
    }

    pub fn len(&self) -> usize {
        self.id_to_char.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_char.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_load_uses_line_numbers() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\nb\nc\n").unwrap();

        let table = VocabularyTable::load(file.path(), 0).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("a"), 0);
        assert_eq!(table.lookup("b"), 1);
        assert_eq!(table.lookup("c"), 2);
    }

    #[test]
    fn test_load_strips_crlf() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "_\r\na\r\nb\r\n").unwrap();

        let table = VocabularyTable::load(file.path(), 0).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("a"), 1);
        assert_eq!(table.lookup("b"), 2);
        assert_eq!(table.reverse(1).unwrap(), "a");
    }

    #[test]
    fn test_unknown_char_maps_to_blank() {
        let table = VocabularyTable::from_entries(["a", "b", "c"], 7).unwrap();
        assert_eq!(table.lookup("z"), 7);
        assert_eq!(table.encode("azb"), vec![0, 7, 1]);
    }

    #[test]
    fn test_encode_splits_unicode_chars() {
        let table = VocabularyTable::from_entries(["天", "氣", "😀"], 0).unwrap();
        assert_eq!(table.encode("氣😀天"), vec![1, 2, 0]);
    }

    #[test]
    fn test_reverse() {
        let table = VocabularyTable::from_entries(["_", "a", "b"], 0).unwrap();
        assert_eq!(table.reverse(2).unwrap(), "b");
        assert!(matches!(table.reverse(3), Err(OcrDataError::LookupMiss(3))));
        assert!(matches!(table.reverse(-1), Err(OcrDataError::LookupMiss(-1))));
    }

    #[test]
    fn test_empty_line_keeps_its_id() {
        let table = VocabularyTable::from_entries(["a", "", "b"], 0).unwrap();
        assert_eq!(table.lookup("b"), 2);
        assert_eq!(table.reverse(1).unwrap(), "");
    }

    #[test]
    fn test_duplicate_entry_is_rejected() {
        let res = VocabularyTable::from_entries(["a", "b", "a"], 0);
        assert!(matches!(res, Err(OcrDataError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let res = VocabularyTable::load("/nonexistent/table.txt", 0);
        assert!(matches!(res, Err(OcrDataError::Config(_))));
    }
}
