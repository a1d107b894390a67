use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::{Error, Result};

/// Labels of the YCB-Video objects, background first.
const YCB_VIDEO_LABELS: [&str; 22] = [
    "background",
    "002_master_chef_can",
    "003_cracker_box",
    "004_sugar_box",
    "005_tomato_soup_can",
    "006_mustard_bottle",
    "007_tuna_fish_can",
    "008_pudding_box",
    "009_gelatin_box",
    "010_potted_meat_can",
    "011_banana",
    "019_pitcher_base",
    "021_bleach_cleanser",
    "024_bowl",
    "025_mug",
    "035_power_drill",
    "036_wood_block",
    "037_scissors",
    "040_large_marker",
    "051_large_clamp",
    "052_extra_large_clamp",
    "061_foam_brick",
];

/// Ordered class taxonomy: every valid class id paired with its label.
///
/// The first entry is the background/ignore class. It is kept in per-class results
/// but excluded from the mean and from false-positive rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaxonomyFile", into = "TaxonomyFile")]
pub struct ClassTaxonomy {
    /// Valid class ids mapped to their labels, in reporting order.
    classes: IndexMap<usize, Box<str>>,
    /// Largest valid id.
    max_id: usize,
}

/// On-disk layout of a taxonomy: two parallel sequences.
#[derive(Serialize, Deserialize)]
struct TaxonomyFile {
    labels: Vec<String>,
    ids: Vec<usize>,
}

impl ClassTaxonomy {
    pub fn new<S: AsRef<str>>(labels: &[S], ids: &[usize]) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidTaxonomy("no classes".to_owned()));
        }
        if labels.len() != ids.len() {
            return Err(Error::InvalidTaxonomy(format!(
                "{} labels for {} class ids",
                labels.len(),
                ids.len()
            )));
        }

        let mut classes = IndexMap::with_capacity(ids.len());
        let mut seen = IndexSet::with_capacity(labels.len());
        for (label, &id) in labels.iter().zip(ids) {
            let label = label.as_ref();
            if !seen.insert(label) {
                return Err(Error::InvalidTaxonomy(format!("label {label:?} repeats")));
            }
            if classes.insert(id, label.into()).is_some() {
                return Err(Error::InvalidTaxonomy(format!("class id {id} repeats")));
            }
        }
        let max_id = ids.iter().copied().max().unwrap_or_default();

        Ok(Self { classes, max_id })
    }

    /// The 22-class YCB-Video taxonomy with contiguous ids `0..=21`.
    pub fn ycb_video() -> Self {
        let ids: Vec<usize> = (0..YCB_VIDEO_LABELS.len()).collect();
        Self {
            classes: ids
                .iter()
                .map(|&id| (id, YCB_VIDEO_LABELS[id].into()))
                .collect(),
            max_id: YCB_VIDEO_LABELS.len() - 1,
        }
    }

    /// Loads a taxonomy from a JSON file of the form `{"labels": [...], "ids": [...]}`.
    pub fn load_from_file(file: &mut dyn Read) -> Result<Self> {
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        Ok(serde_json::from_str(&buffer)?)
    }

    /// Sentinel id one past the largest valid id. Never reported.
    #[inline]
    pub fn unknown_id(&self) -> usize {
        self.max_id + 1
    }

    /// Side length of a confusion matrix covering `0..=unknown_id`.
    #[inline]
    pub fn table_size(&self) -> usize {
        self.max_id + 2
    }

    /// Id of the background/ignore class.
    pub fn ignore_id(&self) -> usize {
        self.classes
            .get_index(0)
            .map(|(&id, _)| id)
            .unwrap_or_default()
    }

    #[inline]
    pub fn is_valid(&self, id: usize) -> bool {
        self.classes.contains_key(&id)
    }

    pub fn label_of(&self, id: usize) -> Option<&str> {
        self.classes.get(&id).map(|label| &**label)
    }

    /// All valid `(id, label)` pairs in taxonomy order.
    pub fn classes(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.classes.iter().map(|(&id, label)| (id, &**label))
    }

    /// Valid `(id, label)` pairs, background excluded.
    pub fn reported(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.classes().skip(1)
    }

    /// Valid ids in taxonomy order.
    pub fn valid_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.classes.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassTaxonomy {
    fn default() -> Self {
        Self::ycb_video()
    }
}

impl TryFrom<TaxonomyFile> for ClassTaxonomy {
    type Error = Error;

    fn try_from(file: TaxonomyFile) -> Result<Self> {
        Self::new(file.labels.as_slice(), &file.ids)
    }
}

impl From<ClassTaxonomy> for TaxonomyFile {
    fn from(taxonomy: ClassTaxonomy) -> Self {
        let (ids, labels) = taxonomy
            .classes
            .into_iter()
            .map(|(id, label)| (id, label.into_string()))
            .unzip();
        Self { labels, ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ycb_video_layout() {
        let taxonomy = ClassTaxonomy::ycb_video();
        assert_eq!(taxonomy.len(), 22);
        assert_eq!(taxonomy.unknown_id(), 22);
        assert_eq!(taxonomy.table_size(), 23);
        assert_eq!(taxonomy.ignore_id(), 0);
        assert_eq!(taxonomy.label_of(21), Some("061_foam_brick"));
        assert!(!taxonomy.is_valid(22));
        assert_eq!(taxonomy.reported().count(), 21);
    }

    #[test]
    fn rejects_malformed_taxonomies() {
        let empty: [&str; 0] = [];
        assert!(ClassTaxonomy::new(&empty, &[]).is_err());
        assert!(ClassTaxonomy::new(&["bg", "a"], &[0]).is_err());
        assert!(ClassTaxonomy::new(&["bg", "a"], &[0, 0]).is_err());
        assert!(matches!(
            ClassTaxonomy::new(&["bg", "a", "a"], &[0, 1, 2]),
            Err(Error::InvalidTaxonomy(message)) if message.contains("\"a\"")
        ));

        let repeated_label = r#"{"labels": ["bg", "a", "a"], "ids": [0, 1, 2]}"#;
        assert!(ClassTaxonomy::load_from_file(&mut repeated_label.as_bytes()).is_err());
    }

    #[test]
    fn sparse_ids_size_the_table_by_max_id() {
        let taxonomy = ClassTaxonomy::new(&["bg", "a", "b"], &[0, 3, 7]).unwrap();
        assert_eq!(taxonomy.unknown_id(), 8);
        assert_eq!(taxonomy.table_size(), 9);
        assert!(!taxonomy.is_valid(4));
    }

    #[test]
    fn loads_and_validates_json() {
        let json = r#"{"labels": ["bg", "a", "b"], "ids": [0, 1, 2]}"#;
        let taxonomy = ClassTaxonomy::load_from_file(&mut json.as_bytes()).unwrap();
        assert_eq!(taxonomy.label_of(2), Some("b"));

        let round_trip: ClassTaxonomy =
            serde_json::from_str(&serde_json::to_string(&taxonomy).unwrap()).unwrap();
        assert_eq!(round_trip, taxonomy);

        let bad = r#"{"labels": ["bg"], "ids": [0, 1]}"#;
        assert!(ClassTaxonomy::load_from_file(&mut bad.as_bytes()).is_err());
    }
}
