use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A dense map of class ids over a pixel grid, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    shape: Box<[usize]>,
    ids: Box<[usize]>,
}

impl LabelMap {
    /// Wraps a label buffer, checking that it fills `shape` exactly.
    pub fn new(shape: &[usize], ids: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != ids.len() {
            return Err(Error::InvalidShape {
                shape: shape.to_vec(),
                len: ids.len(),
            });
        }

        Ok(Self {
            shape: shape.into(),
            ids: ids.into_boxed_slice(),
        })
    }

    /// A flat label map with one dimension.
    pub fn from_flat(ids: Vec<usize>) -> Self {
        Self {
            shape: Box::new([ids.len()]),
            ids: ids.into_boxed_slice(),
        }
    }

    /// Converts per-pixel class scores into discrete ids by taking the argmax.
    ///
    /// `scores` is channel-last: the `num_classes` scores of a pixel are contiguous.
    /// Ties resolve to the lowest class id.
    pub fn from_scores(shape: &[usize], scores: &[f32], num_classes: usize) -> Result<Self> {
        let pixels: usize = shape.iter().product();
        if num_classes == 0 || pixels * num_classes != scores.len() {
            return Err(Error::InvalidShape {
                shape: shape.iter().copied().chain([num_classes]).collect(),
                len: scores.len(),
            });
        }

        let ids = scores
            .chunks_exact(num_classes)
            .map(|pixel| {
                pixel
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (class, &score)| {
                        if score > best.1 {
                            (class, score)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect::<Vec<usize>>();

        Self::new(shape, ids)
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// Number of pixels covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Ground truth and prediction for one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRecord {
    pub scene_id: Box<str>,
    pub ground_truth: LabelMap,
    pub predicted: LabelMap,
}

impl SceneRecord {
    pub fn new(scene_id: &str, ground_truth: LabelMap, predicted: LabelMap) -> Self {
        Self {
            scene_id: scene_id.into(),
            ground_truth,
            predicted,
        }
    }

    /// Checks that both label maps cover the same pixel grid.
    pub fn validate(&self) -> Result<()> {
        if self.ground_truth.shape() != self.predicted.shape() {
            return Err(Error::ShapeMismatch {
                scene_id: self.scene_id.to_string(),
                ground_truth: self.ground_truth.shape().to_vec(),
                predicted: self.predicted.shape().to_vec(),
            });
        }
        Ok(())
    }
}

/// Scenes keyed by their identifier, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SceneSet(IndexMap<Box<str>, SceneRecord>);

impl SceneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scene, replacing any earlier scene with the same id.
    pub fn insert(&mut self, record: SceneRecord) -> Option<SceneRecord> {
        self.0.insert(record.scene_id.clone(), record)
    }

    pub fn get(&self, scene_id: &str) -> Option<&SceneRecord> {
        self.0.get(scene_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneRecord> {
        self.0.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SceneRecord> for SceneSet {
    fn from_iter<I: IntoIterator<Item = SceneRecord>>(iter: I) -> Self {
        let mut scenes = Self::new();
        iter.into_iter().for_each(|record| _ = scenes.insert(record));
        scenes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_map_checks_buffer_length() {
        assert!(LabelMap::new(&[2, 3], vec![0; 6]).is_ok());
        assert!(matches!(
            LabelMap::new(&[2, 3], vec![0; 5]),
            Err(Error::InvalidShape { len: 5, .. })
        ));
    }

    #[test]
    fn argmax_over_scores() {
        let scores = [
            0.1, 0.7, 0.2, //
            0.9, 0.05, 0.05, //
            0.3, 0.3, 0.4, //
            0.5, 0.5, 0.0,
        ];
        let labels = LabelMap::from_scores(&[2, 2], &scores, 3).unwrap();
        assert_eq!(labels.ids(), &[1, 0, 2, 0]);
        assert_eq!(labels.shape(), &[2, 2]);

        assert!(LabelMap::from_scores(&[2, 2], &scores, 4).is_err());
        assert!(LabelMap::from_scores(&[2, 2], &scores, 0).is_err());
    }

    #[test]
    fn validate_rejects_mismatched_layouts() {
        let same_len = SceneRecord::new(
            "scene",
            LabelMap::new(&[2, 3], vec![0; 6]).unwrap(),
            LabelMap::new(&[3, 2], vec![0; 6]).unwrap(),
        );
        match same_len.validate() {
            Err(Error::ShapeMismatch {
                scene_id,
                ground_truth,
                predicted,
            }) => {
                assert_eq!(scene_id, "scene");
                assert_eq!(ground_truth, vec![2, 3]);
                assert_eq!(predicted, vec![3, 2]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn scene_set_keeps_insertion_order_and_replaces_duplicates() {
        let record = |id: &str, v: usize| {
            SceneRecord::new(id, LabelMap::from_flat(vec![v]), LabelMap::from_flat(vec![v]))
        };
        let mut scenes: SceneSet = [record("b", 0), record("a", 1)].into_iter().collect();
        assert!(scenes.insert(record("b", 2)).is_some());

        let ids: Vec<&str> = scenes.iter().map(|s| &*s.scene_id).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(scenes.get("b").unwrap().ground_truth.ids(), &[2]);
    }
}
