use serde::{Deserialize, Serialize};
use std::io::Read;
use wide::u64x4;

use crate::error::{Error, Result};
use crate::scene::SceneRecord;
use crate::taxonomy::ClassTaxonomy;

/// Square table of pixel counts indexed by `(ground truth, prediction)`.
///
/// The last row and column belong to the unknown sentinel id: any id at or above it
/// is counted there. Counts only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    size: usize,
    /// Row-major counts, `size * size` entries.
    counts: Box<[u64]>,
}

impl ConfusionMatrix {
    /// An empty table of `size * size` cells.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            counts: vec![0u64; size * size].into_boxed_slice(),
        }
    }

    /// An empty table covering every valid id of `taxonomy` plus the unknown sentinel.
    pub fn for_taxonomy(taxonomy: &ClassTaxonomy) -> Self {
        Self::new(taxonomy.table_size())
    }

    /// Loads a table previously written by [`ConfusionMatrix::save_to_file`].
    pub fn load_from_file(file: &mut dyn Read) -> Result<Self> {
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        let matrix: Self = serde_json::from_str(&buffer)?;
        let expected = matrix
            .size
            .checked_mul(matrix.size)
            .ok_or(Error::MatrixSizeMismatch {
                expected: usize::MAX,
                found: matrix.counts.len(),
            })?;
        if matrix.counts.len() != expected {
            return Err(Error::MatrixSizeMismatch {
                expected,
                found: matrix.counts.len(),
            });
        }
        Ok(matrix)
    }

    pub fn save_to_file(&self, file: &mut dyn std::io::Write) -> Result<()> {
        let serialized = serde_json::to_string(self)?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }

    /// Folds one scene into the table.
    ///
    /// Fails without touching the table when the two label maps have different shapes.
    pub fn fold_scene(&mut self, scene: &SceneRecord) -> Result<()> {
        scene.validate()?;
        self.scatter(scene.ground_truth.ids(), scene.predicted.ids());
        Ok(())
    }

    /// Folds two flat label buffers into the table.
    pub fn fold(&mut self, ground_truth: &[usize], predicted: &[usize]) -> Result<()> {
        if ground_truth.len() != predicted.len() {
            return Err(Error::LengthMismatch {
                ground_truth: ground_truth.len(),
                predicted: predicted.len(),
            });
        }
        self.scatter(ground_truth, predicted);
        Ok(())
    }

    fn scatter(&mut self, ground_truth: &[usize], predicted: &[usize]) {
        let Some(sentinel) = self.size.checked_sub(1) else {
            return;
        };
        for (&g, &p) in ground_truth.iter().zip(predicted) {
            self.counts[g.min(sentinel) * self.size + p.min(sentinel)] += 1;
        }
    }

    /// Adds every cell of `other` into this table.
    pub fn merge(&mut self, other: &ConfusionMatrix) -> Result<()> {
        if self.size != other.size {
            return Err(Error::MatrixSizeMismatch {
                expected: self.size,
                found: other.size,
            });
        }

        let mut lhs = self.counts.chunks_exact_mut(4);
        let mut rhs = other.counts.chunks_exact(4);
        for (a, b) in (&mut lhs).zip(&mut rhs) {
            let sum = u64x4::new([a[0], a[1], a[2], a[3]]) + u64x4::new([b[0], b[1], b[2], b[3]]);
            a.copy_from_slice(&sum.to_array());
        }
        for (a, b) in lhs.into_remainder().iter_mut().zip(rhs.remainder()) {
            *a += b;
        }
        Ok(())
    }

    /// Side length of the table.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, ground_truth: usize, predicted: usize) -> u64 {
        self.counts[ground_truth * self.size + predicted]
    }

    /// Row `ground_truth` as a slice over predictions.
    #[inline]
    pub fn row(&self, ground_truth: usize) -> &[u64] {
        let start = ground_truth * self.size;
        &self.counts[start..start + self.size]
    }

    /// Pixels whose ground truth is `ground_truth`.
    pub fn row_sum(&self, ground_truth: usize) -> u64 {
        self.row(ground_truth).iter().sum()
    }

    /// Sum of column `predicted` over the given rows.
    pub fn column_sum_over(&self, rows: impl IntoIterator<Item = usize>, predicted: usize) -> u64 {
        rows.into_iter().map(|row| self.get(row, predicted)).sum()
    }

    /// Total number of pixels folded in.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Correct pixels over ground-truth pixels of the non-background classes of
    /// `taxonomy`. Background and unknown pixels never count. NaN when there are none.
    pub fn pixel_accuracy(&self, taxonomy: &ClassTaxonomy) -> f64 {
        let (correct, total) = taxonomy
            .reported()
            .map(|(id, _)| id)
            .filter(|&id| id < self.size)
            .fold((0u64, 0u64), |(correct, total), id| {
                (correct + self.get(id, id), total + self.row_sum(id))
            });
        correct as f64 / total as f64
    }

    /// Fraction of `class` pixels predicted as `class`; NaN when the class has no pixels.
    pub fn recall(&self, class: usize) -> f64 {
        let true_positive = self.get(class, class);
        let total_actual_positive = self.row_sum(class);
        if total_actual_positive == 0 {
            return f64::NAN;
        }
        true_positive as f64 / total_actual_positive as f64
    }
}
