//! Summary statistics derived from a finished confusion matrix.
//!
//! The mean IoU divides the sum of per-class ratios by the number of non-background
//! classes, so a single class that never occurs turns the mean into NaN instead of
//! being skipped.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::confusion::ConfusionMatrix;
use crate::error::{Error, Result};
use crate::iou::{class_iou, ClassIou};
use crate::sink::LogSink;
use crate::taxonomy::ClassTaxonomy;

static CLASS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<label>\S.*?)\s*: +(?P<ratio>nan|\d+\.\d+)   \( *(?P<tp>\d+)/(?P<denom>\d+) *\)$")
        .expect("class line pattern")
});

static MEAN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^mean: +(?P<mean>nan|\d+\.\d+)$").expect("mean line pattern"));

/// Per-class IoU plus the aggregate metrics of one evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct IouReport {
    /// Every valid class, keyed by label in taxonomy order. `None` marks an absent class.
    pub per_class: IndexMap<Box<str>, Option<ClassIou>>,
    /// Unweighted mean IoU over the non-background classes.
    pub mean_iou: f64,
    /// Correct pixels over ground-truth pixels of the non-background classes.
    pub pixel_accuracy: f64,
    /// Mean recall over the non-background classes present in the ground truth.
    pub mean_class_accuracy: f64,
    /// IoU weighted by ground-truth pixel frequency.
    pub frequency_weighted_iou: f64,
}

impl IouReport {
    /// Derives the report of `confusion`.
    ///
    /// Fails when the table was not sized for `taxonomy`: its sentinel row would then
    /// hold a real class and unknown pixels would be reported as that class.
    pub fn build(confusion: &ConfusionMatrix, taxonomy: &ClassTaxonomy) -> Result<Self> {
        if confusion.size() != taxonomy.table_size() {
            return Err(Error::MatrixSizeMismatch {
                expected: taxonomy.table_size(),
                found: confusion.size(),
            });
        }

        let per_class: IndexMap<Box<str>, Option<ClassIou>> = taxonomy
            .classes()
            .map(|(id, label)| (label.into(), class_iou(id, confusion, taxonomy)))
            .collect();

        let reported: Vec<usize> = taxonomy.reported().map(|(id, _)| id).collect();
        let class_count = reported.len();

        let mean_iou = per_class
            .values()
            .skip(1)
            .map(|iou| ClassIou::ratio_or_nan(iou.as_ref()))
            .sum::<f64>()
            / class_count as f64;

        let gt_pixels: u64 = reported.iter().map(|&id| confusion.row_sum(id)).sum();
        let pixel_accuracy = confusion.pixel_accuracy(taxonomy);

        let recalls: Vec<f64> = reported
            .iter()
            .map(|&id| confusion.recall(id))
            .filter(|recall| !recall.is_nan())
            .collect();
        let mean_class_accuracy = recalls.iter().sum::<f64>() / recalls.len() as f64;

        let frequency_weighted_iou = reported
            .iter()
            .filter_map(|&id| {
                let iou = class_iou(id, confusion, taxonomy)?;
                Some(confusion.row_sum(id) as f64 * iou.ratio)
            })
            .sum::<f64>()
            / gt_pixels as f64;

        Ok(Self {
            per_class,
            mean_iou,
            pixel_accuracy,
            mean_class_accuracy,
            frequency_weighted_iou,
        })
    }

    /// Result of the class called `label`.
    pub fn class(&self, label: &str) -> Option<&ClassIou> {
        self.per_class.get(label).and_then(Option::as_ref)
    }

    /// One line per non-background class, then the mean.
    pub fn lines(&self) -> Vec<String> {
        self.per_class
            .iter()
            .skip(1)
            .map(|(label, iou)| ReportLine::new(label, iou.as_ref()).to_string())
            .chain([format!("mean: {}", Ratio(self.mean_iou))])
            .collect()
    }

    /// Writes the full table and the secondary metrics to `sink`.
    pub fn emit(&self, sink: &mut dyn LogSink) {
        sink.info("classes          IoU");
        sink.info("----------------------------");
        for line in self.lines() {
            sink.info(&line);
        }
        sink.info("----------------------------");
        sink.info(&format!("pixel accuracy: {}", Ratio(self.pixel_accuracy)));
        sink.info(&format!(
            "mean class accuracy: {}",
            Ratio(self.mean_class_accuracy)
        ));
        sink.info(&format!(
            "frequency weighted IoU: {}",
            Ratio(self.frequency_weighted_iou)
        ));
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_to_file(&self, file: &mut dyn std::io::Write) -> Result<()> {
        file.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }
}

/// A ratio printed with 3 decimals, `nan` when undefined.
struct Ratio(f64);

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            write!(f, "{:>5}", "nan")
        } else {
            write!(f, "{:>5.3}", self.0)
        }
    }
}

/// The printed form of one class result.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub label: String,
    pub ratio: f64,
    pub true_positives: u64,
    pub denominator: u64,
}

impl ReportLine {
    pub fn new(label: &str, iou: Option<&ClassIou>) -> Self {
        Self {
            label: label.to_owned(),
            ratio: ClassIou::ratio_or_nan(iou),
            true_positives: iou.map_or(0, |iou| iou.true_positives),
            denominator: iou.map_or(0, |iou| iou.denominator),
        }
    }

    /// Parses the value of a `mean:` line.
    pub fn parse_mean(line: &str) -> Result<f64> {
        let caps = MEAN_LINE
            .captures(line)
            .ok_or_else(|| Error::InvalidReportLine(line.to_owned()))?;
        parse_ratio(&caps["mean"], line)
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<14}: {}   ({:>6}/{:<6})",
            self.label,
            Ratio(self.ratio),
            self.true_positives,
            self.denominator
        )
    }
}

impl FromStr for ReportLine {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let caps = CLASS_LINE
            .captures(line)
            .ok_or_else(|| Error::InvalidReportLine(line.to_owned()))?;
        let count = |name: &str| {
            caps[name]
                .parse::<u64>()
                .map_err(|_| Error::InvalidReportLine(line.to_owned()))
        };

        Ok(Self {
            label: caps["label"].to_owned(),
            ratio: parse_ratio(&caps["ratio"], line)?,
            true_positives: count("tp")?,
            denominator: count("denom")?,
        })
    }
}

fn parse_ratio(text: &str, line: &str) -> Result<f64> {
    if text == "nan" {
        return Ok(f64::NAN);
    }
    text.parse()
        .map_err(|_| Error::InvalidReportLine(line.to_owned()))
}
