//! Per-class Intersection-over-Union.

use serde::{Deserialize, Serialize};

use crate::confusion::ConfusionMatrix;
use crate::taxonomy::ClassTaxonomy;

/// IoU of one class with the counts it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassIou {
    pub ratio: f64,
    pub true_positives: u64,
    /// `true_positives + false_positives + false_negatives`
    pub denominator: u64,
}

impl ClassIou {
    /// The ratio of a class result, NaN for an absent class.
    #[inline]
    pub fn ratio_or_nan(iou: Option<&ClassIou>) -> f64 {
        iou.map_or(f64::NAN, |iou| iou.ratio)
    }
}

/// IoU of `label_id`, or `None` when the id is not a valid class, the class never
/// occurs in the table, or the table was not sized for `taxonomy`.
///
/// False positives are counted over the rows of the other valid classes only; pixels
/// whose ground truth is the ignore class or the unknown sentinel never count against
/// a class.
pub fn class_iou(
    label_id: usize,
    confusion: &ConfusionMatrix,
    taxonomy: &ClassTaxonomy,
) -> Option<ClassIou> {
    if !taxonomy.is_valid(label_id) || confusion.size() != taxonomy.table_size() {
        return None;
    }

    let true_positives = confusion.get(label_id, label_id);
    let false_negatives = confusion.row_sum(label_id) - true_positives;
    let ignore_id = taxonomy.ignore_id();
    let false_positives = confusion.column_sum_over(
        taxonomy
            .valid_ids()
            .filter(|&id| id != label_id && id != ignore_id),
        label_id,
    );

    let denominator = true_positives + false_positives + false_negatives;
    if denominator == 0 {
        return None;
    }

    Some(ClassIou {
        ratio: true_positives as f64 / denominator as f64,
        true_positives,
        denominator,
    })
}
