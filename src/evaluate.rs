use rayon::prelude::*;

use crate::confusion::ConfusionMatrix;
use crate::error::{Error, Result};
use crate::report::IouReport;
use crate::scene::{SceneRecord, SceneSet};
use crate::sink::LogSink;
use crate::taxonomy::ClassTaxonomy;

/// Folds a set of scenes into a confusion matrix and reports IoU over a taxonomy.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    taxonomy: ClassTaxonomy,
    parallel: bool,
}

impl Evaluator {
    pub fn new(taxonomy: ClassTaxonomy) -> Self {
        Self {
            taxonomy,
            parallel: false,
        }
    }

    /// Folds scenes on the rayon pool into per-worker tables merged at the end.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[inline]
    pub fn taxonomy(&self) -> &ClassTaxonomy {
        &self.taxonomy
    }

    /// Evaluates every scene and writes the report to `sink`.
    ///
    /// The first scene with mismatched shapes aborts the run; no report is produced.
    pub fn evaluate(&self, scenes: &SceneSet, sink: &mut dyn LogSink) -> Result<IouReport> {
        sink.info(&format!("evaluating {} scans...", scenes.len()));
        let confusion = self.accumulate(scenes, sink)?;
        sink.info("");

        let report = IouReport::build(&confusion, &self.taxonomy)?;
        report.emit(sink);
        Ok(report)
    }

    /// Builds the confusion matrix of `scenes`.
    pub fn accumulate(&self, scenes: &SceneSet, sink: &mut dyn LogSink) -> Result<ConfusionMatrix> {
        if self.parallel {
            let confusion = self.accumulate_parallel(scenes)?;
            sink.progress(scenes.len());
            return Ok(confusion);
        }

        let mut confusion = ConfusionMatrix::for_taxonomy(&self.taxonomy);
        for (i, scene) in scenes.iter().enumerate() {
            confusion.fold_scene(scene)?;
            sink.progress(i + 1);
        }
        Ok(confusion)
    }

    fn accumulate_parallel(&self, scenes: &SceneSet) -> Result<ConfusionMatrix> {
        let size = self.taxonomy.table_size();
        let records: Vec<&SceneRecord> = scenes.iter().collect();

        records
            .par_iter()
            .try_fold(
                || ConfusionMatrix::new(size),
                |mut partial, scene| {
                    partial.fold_scene(scene)?;
                    Ok::<_, Error>(partial)
                },
            )
            .try_reduce(
                || ConfusionMatrix::new(size),
                |mut total, partial| {
                    total.merge(&partial)?;
                    Ok::<_, Error>(total)
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::LabelMap;
    use crate::sink::MemorySink;

    fn taxonomy() -> ClassTaxonomy {
        ClassTaxonomy::new(&["background", "a", "b"], &[0, 1, 2]).unwrap()
    }

    fn scenes() -> SceneSet {
        (0..16)
            .map(|i| {
                let gt: Vec<usize> = (0..64).map(|p| (p + i) % 4).collect();
                let pred: Vec<usize> = (0..64).map(|p| (p * i + 1) % 3).collect();
                SceneRecord::new(
                    &format!("scene_{i:02}"),
                    LabelMap::new(&[8, 8], gt).unwrap(),
                    LabelMap::new(&[8, 8], pred).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn logs_progress_and_report() {
        let mut sink = MemorySink::default();
        let report = Evaluator::new(taxonomy())
            .evaluate(&scenes(), &mut sink)
            .unwrap();

        assert_eq!(sink.lines[0], "evaluating 16 scans...");
        assert_eq!(sink.lines[1], "");
        assert_eq!(sink.processed, 16);
        assert!(sink.lines.contains(report.lines().last().unwrap()));
    }

    #[test]
    fn parallel_matches_sequential() {
        let scenes = scenes();
        let sequential = Evaluator::new(taxonomy())
            .accumulate(&scenes, &mut MemorySink::default())
            .unwrap();
        let parallel = Evaluator::new(taxonomy())
            .parallel(true)
            .accumulate(&scenes, &mut MemorySink::default())
            .unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.total(), 16 * 64);
    }

    #[test]
    fn shape_mismatch_aborts_without_report() {
        for parallel in [false, true] {
            let mut scenes = scenes();
            scenes.insert(SceneRecord::new(
                "broken",
                LabelMap::from_flat(vec![1; 100]),
                LabelMap::from_flat(vec![1; 99]),
            ));

            let mut sink = MemorySink::default();
            let result = Evaluator::new(taxonomy())
                .parallel(parallel)
                .evaluate(&scenes, &mut sink);
            assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
            assert!(!sink.lines.iter().any(|line| line.starts_with("mean:")));
        }
    }
}
