use std::sync::Arc;

use burn::tensor::{backend::Backend, Tensor};
use num_traits::PrimInt;

use super::vocabulary::VocabularyTable;
use crate::{
    error::{OcrDataError, Result},
    sparse::SparseLabels,
};

/// Maps one id sequence back to text.
///
/// With `merge_repeated`, an id equal to the one right before it is skipped.
/// Blanks take part in that comparison like any other id, so `[5, 0, 5]`
/// keeps both fives. Blanks are never emitted, and ids outside the
/// vocabulary contribute nothing.
pub fn decode<INT: PrimInt>(
    ids: &[INT],
    vocabulary: &VocabularyTable,
    blank_id: i32,
    merge_repeated: bool,
) -> String {
    let mut text = String::new();
    let mut previous: Option<i64> = None;

    for id in ids {
        // u64 ids past i64::MAX cannot be in the table either
        let id = id.to_i64().unwrap_or(i64::MIN);
        if merge_repeated && previous == Some(id) {
            continue;
        }
        previous = Some(id);
        if id == blank_id as i64 {
            continue;
        }
        if let Ok(ch) = vocabulary.reverse(id) {
            text.push_str(ch);
        }
    }

    text
}

pub fn map_to_chars<INT: PrimInt, S: AsRef<[INT]>>(
    rows: &[S],
    vocabulary: &VocabularyTable,
    blank_id: i32,
    merge_repeated: bool,
) -> Vec<String> {
    rows.iter()
        .map(|row| decode(row.as_ref(), vocabulary, blank_id, merge_repeated))
        .collect()
}

/// Counts rows whose decoded prediction equals the decoded ground truth.
pub fn score_dense<INT: PrimInt, S: AsRef<[INT]>, T: AsRef<[INT]>>(
    predicted: &[S],
    ground_truth: &[T],
    vocabulary: &VocabularyTable,
    blank_id: i32,
    merge_repeated: bool,
) -> usize {
    let predicted = map_to_chars(predicted, vocabulary, blank_id, merge_repeated);
    let ground_truth = map_to_chars(ground_truth, vocabulary, blank_id, merge_repeated);

    predicted
        .iter()
        .zip(&ground_truth)
        .filter(|(y_pred, y)| y_pred == y)
        .count()
}

/// Exact-match count between two sparse batches, densified with `blank_id`.
pub fn score(
    predicted: &SparseLabels,
    ground_truth: &SparseLabels,
    vocabulary: &VocabularyTable,
    blank_id: i32,
    merge_repeated: bool,
) -> usize {
    score_dense(
        &predicted.to_dense(blank_id),
        &ground_truth.to_dense(blank_id),
        vocabulary,
        blank_id,
        merge_repeated,
    )
}

/// Arg-max id at every time step of `[batch, time, classes]` logits.
///
/// Nothing is collapsed here; score the result with `merge_repeated = true`.
pub fn greedy_ids<B: Backend>(logits: Tensor<B, 3>) -> Result<SparseLabels> {
    let [batch, time, _] = logits.dims();
    let ids = logits
        .argmax(2)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| OcrDataError::Tensor(format!("cannot read predicted ids: {:?}", e)))?;

    let rows: Vec<Vec<i32>> = if time == 0 {
        vec![Vec::new(); batch]
    } else {
        ids.chunks(time)
            .map(|row| row.iter().map(|&id| id as i32).collect())
            .collect()
    };

    Ok(SparseLabels::from_sequences(&rows))
}

/// Bundles a shared vocabulary with the blank/merge settings of one model.
#[derive(Clone, Debug)]
pub struct LabelConverter {
    vocabulary: Arc<VocabularyTable>,
    pub blank_id: i32,
    pub merge_repeated: bool,
}

impl LabelConverter {
    pub fn new(vocabulary: Arc<VocabularyTable>, merge_repeated: bool) -> Self {
        let blank_id = vocabulary.blank_id();
        Self {
            vocabulary,
            blank_id,
            merge_repeated,
        }
    }

    pub fn encode_single(&self, text: &str) -> Vec<i32> {
        self.vocabulary.encode(text)
    }

    pub fn decode<INT: PrimInt, S: AsRef<[INT]>>(&self, encoded_texts: &[S]) -> Vec<String> {
        map_to_chars(
            encoded_texts,
            &self.vocabulary,
            self.blank_id,
            self.merge_repeated,
        )
    }

    pub fn count_matches(&self, predicted: &SparseLabels, ground_truth: &SparseLabels) -> usize {
        score(
            predicted,
            ground_truth,
            &self.vocabulary,
            self.blank_id,
            self.merge_repeated,
        )
    }
}

#[cfg(test)]
mod test {
    use burn::{
        backend::{ndarray::NdArrayDevice, NdArray},
        tensor::TensorData,
    };

    use super::*;

    fn table() -> VocabularyTable {
        VocabularyTable::from_entries(["_", "a", "b", "c"], 0).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let table = VocabularyTable::from_entries(["_", "h", "e", "l", "o", "天"], 0).unwrap();
        for label in ["hello", "ll", "天he天"] {
            let ids = table.encode(label);
            assert_eq!(decode(&ids, &table, 0, false), label);
        }
    }

    #[test]
    fn test_blank_is_never_emitted() {
        let table = table();
        assert_eq!(decode(&[0, 1, 0, 0, 2], &table, 0, false), "ab");
        assert_eq!(decode(&[0, 1, 0, 0, 2], &table, 0, true), "ab");
        assert_eq!(decode(&[0i64, 0, 0], &table, 0, true), "");
    }

    #[test]
    fn test_merge_repeated() {
        let table = VocabularyTable::from_entries(["_", "a", "b", "c", "d", "e"], 0).unwrap();
        assert_eq!(decode(&[5, 5, 5], &table, 0, true), "e");
        assert_eq!(decode(&[5, 0, 5], &table, 0, true), "ee");
        assert_eq!(
            decode(&[5, 5, 0, 5], &table, 0, true),
            decode(&[5, 0, 5], &table, 0, true)
        );
        assert_eq!(decode(&[5, 5, 5], &table, 0, false), "eee");
    }

    #[test]
    fn test_out_of_range_ids_are_dropped() {
        let table = table();
        assert_eq!(decode(&[1, 42, -3, 2], &table, 0, false), "ab");
    }

    #[test]
    fn test_blank_outside_table() {
        let table = VocabularyTable::from_entries(["a", "b"], 2).unwrap();
        assert_eq!(decode(&[0, 2, 1, 1], &table, 2, true), "ab");
    }

    #[test]
    fn test_score() {
        let table = table();
        let predicted = SparseLabels::from_dense(&[vec![1, 2, 0], vec![3, 0, 0]], 0);
        let truth = SparseLabels::from_dense(&[vec![1, 2, 0], vec![3, 3, 0]], 0);

        assert_eq!(
            map_to_chars(&predicted.to_dense(0), &table, 0, false),
            vec!["ab", "c"]
        );
        assert_eq!(
            map_to_chars(&truth.to_dense(0), &table, 0, false),
            vec!["ab", "cc"]
        );
        assert_eq!(score(&predicted, &truth, &table, 0, false), 1);
        assert_eq!(score(&predicted, &truth, &table, 0, true), 2);
    }

    #[test]
    fn test_score_ragged_batches() {
        let table = table();
        let predicted = SparseLabels::from_sequences(&[vec![1, 1, 0, 2], vec![3]]);
        let truth = SparseLabels::from_sequences(&[vec![1, 2], vec![3, 1]]);
        assert_eq!(score(&predicted, &truth, &table, 0, true), 1);
    }

    #[test]
    fn test_label_converter() {
        let converter = LabelConverter::new(Arc::new(table()), true);
        let ids = converter.encode_single("abbc");
        assert_eq!(ids, vec![1, 2, 2, 3]);
        assert_eq!(converter.decode(&[ids.clone()]), vec!["abc"]);

        let truth = SparseLabels::from_sequences(&[vec![1, 2, 0, 2, 3]]);
        let predicted = SparseLabels::from_sequences(&[ids]);
        assert_eq!(converter.count_matches(&predicted, &truth), 0);
    }

    #[test]
    fn test_greedy_ids() {
        let device = NdArrayDevice::Cpu;
        // [batch = 1, time = 4, classes = 3]
        let logits = Tensor::<NdArray, 3>::from_data(
            TensorData::new(
                vec![
                    0.1f32, 0.9, 0.0, //
                    0.1, 0.9, 0.0, //
                    0.9, 0.1, 0.0, //
                    0.0, 0.1, 0.9,
                ],
                [1, 4, 3],
            ),
            &device,
        );

        let ids = greedy_ids(logits).unwrap();
        assert_eq!(ids.sequences(), vec![vec![1, 1, 0, 2]]);
        assert_eq!(decode(&ids.sequences()[0], &table(), 0, true), "ab");
    }
}
