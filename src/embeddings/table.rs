use crate::error::{Error, Result};

use super::vocabulary::{OOV_ID, PAD_ID};

/// Dense row-major storage of one vector per vocabulary id
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingTable {
    /// Width of every row
    dim: usize,

    /// `rows * dim` components
    data: Vec<f32>,
}

impl EmbeddingTable {
    /// Wrap raw row-major components, checking they divide evenly into rows
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Format(
                "embedding vectors must have at least one component".to_string(),
            ));
        }

        if data.len() % dim != 0 {
            return Err(Error::Format(format!(
                "{} components do not form rows of width {}",
                data.len(),
                dim
            )));
        }

        Ok(Self { dim, data })
    }

    /// Build a table from pretrained rows, prefixing the padding and OOV rows
    pub(crate) fn with_reserved_rows(dim: usize, rows: Vec<f32>, oov: Vec<f32>) -> Result<Self> {
        debug_assert_eq!(oov.len(), dim);

        let mut data = Vec::with_capacity(rows.len() + 2 * dim);
        data.extend(std::iter::repeat(0.0).take(dim));
        data.extend(oov);
        data.extend(rows);

        Self::from_raw(dim, data)
    }

    /// The vector for an id. Ids past the end fall back to the OOV row.
    pub fn row(&self, id: usize) -> &[f32] {
        let id = if id < self.rows() { id } else { OOV_ID };
        let start = id * self.dim;

        &self.data[start..start + self.dim]
    }

    /// The padding row, which is always zero
    pub fn padding(&self) -> &[f32] {
        self.row(PAD_ID)
    }

    /// Width of every row
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Raw row-major components
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_rows() {
        let table =
            EmbeddingTable::with_reserved_rows(2, vec![1.0, 2.0, 3.0, 4.0], vec![0.5, 0.5]).unwrap();

        assert_eq!(table.rows(), 4);
        assert_eq!(table.padding(), &[0.0, 0.0]);
        assert_eq!(table.row(OOV_ID), &[0.5, 0.5]);
        assert_eq!(table.row(3), &[3.0, 4.0]);
    }

    #[test]
    fn test_out_of_range_ids_use_oov_row() {
        let table = EmbeddingTable::with_reserved_rows(1, vec![7.0], vec![0.0]).unwrap();

        assert_eq!(table.row(99), table.row(OOV_ID));
    }

    #[test]
    fn test_ragged_data_is_rejected() {
        assert!(matches!(
            EmbeddingTable::from_raw(3, vec![0.0; 4]),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            EmbeddingTable::from_raw(0, vec![]),
            Err(Error::Format(_))
        ));
    }
}
