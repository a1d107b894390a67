//! Scene files written by the inference pipeline.
//!
//! Two layouts are read:
//!
//! - JSON: an object mapping each scene id to
//!   `{"shape": [h, w], "semantic_gt": [...], "semantic_pred": [...]}`. `shape` is
//!   optional; without it each array is taken as a flat buffer of its own length.
//! - Parquet: one row per scene with columns
//!   `scene_id: string, shape: list<int>, semantic_gt: list<int>, semantic_pred: list<int>`.
//!   An empty `shape` list means flat buffers.
//!
//! Negative ids cannot be valid classes; they are folded as unknown.

use indexmap::IndexMap;
use parquet::{
    file::{reader::FileReader, serialized_reader::SerializedFileReader},
    record::{Field, List, RowAccessor},
};
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

use crate::error::{Error, Result};
use crate::scene::{LabelMap, SceneRecord, SceneSet};

#[derive(Deserialize)]
struct JsonScene {
    #[serde(default)]
    shape: Option<Vec<usize>>,
    semantic_gt: Vec<i64>,
    semantic_pred: Vec<i64>,
}

/// Reads a scene file, choosing the layout from the file extension.
pub fn load_path(path: &Path) -> Result<SceneSet> {
    let mut file = File::open(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("parquet") => load_parquet(file),
        _ => load_json(&mut file),
    }
}

pub fn load_json(reader: &mut dyn Read) -> Result<SceneSet> {
    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;
    let scenes: IndexMap<String, JsonScene> = serde_json::from_str(&buffer)?;

    scenes
        .into_iter()
        .map(|(scene_id, scene)| {
            build_record(
                &scene_id,
                scene.shape.as_deref(),
                scene.semantic_gt,
                scene.semantic_pred,
            )
        })
        .collect()
}

pub fn load_parquet(file: File) -> Result<SceneSet> {
    let reader = SerializedFileReader::new(file)?;

    let mut scenes = SceneSet::new();
    for row in reader.get_row_iter(None)? {
        let row = row?;
        let scene_id = row.get_string(0)?;
        let shape = shape_dims(scene_id, list_to_ids(scene_id, row.get_list(1)?)?)?;
        let gt = list_to_ids(scene_id, row.get_list(2)?)?;
        let pred = list_to_ids(scene_id, row.get_list(3)?)?;

        let shape = (!shape.is_empty()).then_some(shape.as_slice());
        scenes.insert(build_record(scene_id, shape, gt, pred)?);
    }

    Ok(scenes)
}

fn build_record(
    scene_id: &str,
    shape: Option<&[usize]>,
    gt: Vec<i64>,
    pred: Vec<i64>,
) -> Result<SceneRecord> {
    let label_map = |ids: Vec<i64>| {
        let ids: Vec<usize> = ids
            .into_iter()
            .map(|id| usize::try_from(id).unwrap_or(usize::MAX))
            .collect();
        match shape {
            Some(shape) => LabelMap::new(shape, ids),
            None => Ok(LabelMap::from_flat(ids)),
        }
    };

    Ok(SceneRecord::new(scene_id, label_map(gt)?, label_map(pred)?))
}

fn shape_dims(scene_id: &str, dims: Vec<i64>) -> Result<Vec<usize>> {
    dims.into_iter()
        .map(|dim| {
            usize::try_from(dim).map_err(|_| {
                Error::InvalidRecord(format!("{scene_id}: negative dimension {dim}"))
            })
        })
        .collect()
}

fn list_to_ids(scene_id: &str, list: &List) -> Result<Vec<i64>> {
    list.elements()
        .iter()
        .map(|field| match *field {
            Field::Byte(v) => Ok(v as i64),
            Field::Short(v) => Ok(v as i64),
            Field::Int(v) => Ok(v as i64),
            Field::Long(v) => Ok(v),
            Field::UByte(v) => Ok(v as i64),
            Field::UShort(v) => Ok(v as i64),
            Field::UInt(v) => Ok(v as i64),
            Field::ULong(v) => Ok(i64::try_from(v).unwrap_or(i64::MAX)),
            ref other => Err(Error::InvalidRecord(format!(
                "{scene_id}: expected integer label, found {other}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_json_in_file_order() {
        let json = r#"{
            "scene_b": {"shape": [2, 2], "semantic_gt": [0, 1, 1, 2], "semantic_pred": [0, 1, 2, 2]},
            "scene_a": {"semantic_gt": [1, -1], "semantic_pred": [1, 1]}
        }"#;
        let scenes = load_json(&mut json.as_bytes()).unwrap();

        let ids: Vec<&str> = scenes.iter().map(|s| &*s.scene_id).collect();
        assert_eq!(ids, ["scene_b", "scene_a"]);

        let b = scenes.get("scene_b").unwrap();
        assert_eq!(b.ground_truth.shape(), &[2, 2]);
        assert_eq!(b.predicted.ids(), &[0, 1, 2, 2]);

        let a = scenes.get("scene_a").unwrap();
        assert_eq!(a.ground_truth.shape(), &[2]);
        assert_eq!(a.ground_truth.ids(), &[1, usize::MAX]);
    }

    #[test]
    fn json_length_mismatch_surfaces_when_folding() {
        let json = r#"{"s": {"semantic_gt": [1, 1, 1], "semantic_pred": [1, 1]}}"#;
        let scenes = load_json(&mut json.as_bytes()).unwrap();
        assert!(matches!(
            scenes.get("s").unwrap().validate(),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        assert_eq!(shape_dims("s", vec![480, 640]).unwrap(), vec![480, 640]);
        assert!(shape_dims("s", Vec::new()).unwrap().is_empty());
        match shape_dims("s", vec![-1, -4]) {
            Err(Error::InvalidRecord(message)) => {
                assert!(message.contains("s: negative dimension -1"))
            }
            other => panic!("expected an invalid record, got {other:?}"),
        }
    }

    #[test]
    fn json_shape_must_fit() {
        let json = r#"{"s": {"shape": [2, 2], "semantic_gt": [1, 1, 1], "semantic_pred": [1, 1, 1]}}"#;
        assert!(matches!(
            load_json(&mut json.as_bytes()),
            Err(Error::InvalidShape { .. })
        ));
        assert!(load_json(&mut "[1, 2]".as_bytes()).is_err());
    }
}
