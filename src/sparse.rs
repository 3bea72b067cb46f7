use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::error::{OcrDataError, Result};

/// Ragged label batch stored as explicit `(row, position) -> id` entries over
/// the conceptual dense shape `[rows, max_len]`.
///
/// Positions past a row's own length are absent rather than zero-filled.
/// Entries are kept in row-major order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SparseLabels {
    indices: Vec<[usize; 2]>,
    values: Vec<i32>,
    dense_shape: [usize; 2],
}

impl SparseLabels {
    /// Checks that every entry lies inside `dense_shape`, that each
    /// `(row, position)` appears once and that entries are row-major.
    pub fn new(
        indices: Vec<[usize; 2]>,
        values: Vec<i32>,
        dense_shape: [usize; 2],
    ) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(OcrDataError::Tensor(format!(
                "{} sparse indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        if let Some(&[row, col]) = indices
            .iter()
            .find(|&&[row, col]| row >= dense_shape[0] || col >= dense_shape[1])
        {
            return Err(OcrDataError::Tensor(format!(
                "sparse entry ({}, {}) outside dense shape {:?}",
                row, col, dense_shape
            )));
        }
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(OcrDataError::Tensor(
                "sparse entries must be unique and in row-major order".to_string(),
            ));
        }

        Ok(Self {
            indices,
            values,
            dense_shape,
        })
    }

    pub fn from_sequences<S: AsRef<[i32]>>(sequences: &[S]) -> Self {
        let max_len = sequences
            .iter()
            .map(|seq| seq.as_ref().len())
            .max()
            .unwrap_or(0);
        let nnz = sequences.iter().map(|seq| seq.as_ref().len()).sum();

        let mut indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        for (row, seq) in sequences.iter().enumerate() {
            for (col, &id) in seq.as_ref().iter().enumerate() {
                indices.push([row, col]);
                values.push(id);
            }
        }

        Self {
            indices,
            values,
            dense_shape: [sequences.len(), max_len],
        }
    }

    /// Builds labels from dense rows, dropping each row's trailing `padding`.
    pub fn from_dense<S: AsRef<[i32]>>(rows: &[S], padding: i32) -> Self {
        let sequences: Vec<&[i32]> = rows
            .iter()
            .map(|row| {
                let row = row.as_ref();
                let len = row.iter().rposition(|&id| id != padding).map_or(0, |p| p + 1);
                &row[..len]
            })
            .collect();
        let mut labels = Self::from_sequences(&sequences);
        labels.dense_shape[1] = rows.iter().map(|row| row.as_ref().len()).max().unwrap_or(0);

        labels
    }

    /// Recovers every row's ids, in order.
    pub fn sequences(&self) -> Vec<Vec<i32>> {
        let mut sequences = vec![Vec::new(); self.batch_size()];
        for (&[row, _], &id) in self.indices.iter().zip(&self.values) {
            sequences[row].push(id);
        }
        sequences
    }

    pub fn row_lengths(&self) -> Vec<usize> {
        let mut lengths = vec![0; self.batch_size()];
        for &[row, col] in &self.indices {
            lengths[row] = lengths[row].max(col + 1);
        }
        lengths
    }

    /// Dense `[rows, max_len]` matrix with absent positions set to `fill`.
    pub fn to_dense(&self, fill: i32) -> Vec<Vec<i32>> {
        let [rows, max_len] = self.dense_shape;
        let mut dense = vec![vec![fill; max_len]; rows];
        for (&[row, col], &id) in self.indices.iter().zip(&self.values) {
            dense[row][col] = id;
        }
        dense
    }

    pub fn indices(&self) -> &[[usize; 2]] {
        &self.indices
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn dense_shape(&self) -> [usize; 2] {
        self.dense_shape
    }

    pub fn batch_size(&self) -> usize {
        self.dense_shape[0]
    }

    pub fn max_len(&self) -> usize {
        self.dense_shape[1]
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `[nnz, 2]` tensor of `(row, position)` pairs.
    pub fn indices_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2, Int> {
        let flat: Vec<i64> = self
            .indices
            .iter()
            .flat_map(|&[row, col]| [row as i64, col as i64])
            .collect();
        let data = TensorData::new(flat, [self.nnz(), 2]).convert::<B::IntElem>();
        Tensor::from_data(data, device)
    }

    pub fn values_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1, Int> {
        let data = TensorData::new(self.values.clone(), [self.nnz()]).convert::<B::IntElem>();
        Tensor::from_data(data, device)
    }

    pub fn to_dense_tensor<B: Backend>(
        &self,
        fill: i32,
        device: &B::Device,
    ) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = self.to_dense(fill).into_iter().flatten().collect();
        let data = TensorData::new(flat, self.dense_shape).convert::<B::IntElem>();
        Tensor::from_data(data, device)
    }
}
