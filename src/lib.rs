//! Semantic-segmentation accuracy metrics.
//!
//! Scenes of ground-truth and predicted class ids are folded into a caller-owned
//! [`ConfusionMatrix`]; per-class IoU, mean IoU and pixel accuracy are derived from
//! the finished table.
//!
//! ```rust
//! use segeval::{ClassTaxonomy, ConfusionMatrix, IouReport};
//!
//! # fn main() -> segeval::Result<()> {
//! let taxonomy = ClassTaxonomy::new(&["background", "a", "b"], &[0, 1, 2])?;
//! let mut confusion = ConfusionMatrix::for_taxonomy(&taxonomy);
//! confusion.fold(&[1, 1, 2, 2], &[1, 2, 2, 2])?;
//!
//! let report = IouReport::build(&confusion, &taxonomy)?;
//! assert_eq!(report.class("a").unwrap().true_positives, 1);
//! # Ok(())
//! # }
//! ```

pub mod confusion;
pub mod error;
pub mod evaluate;
pub mod iou;
pub mod report;
pub mod scene;
pub mod sink;
pub mod store;
pub mod taxonomy;

pub use confusion::ConfusionMatrix;
pub use error::{Error, Result};
pub use evaluate::Evaluator;
pub use iou::{class_iou, ClassIou};
pub use report::{IouReport, ReportLine};
pub use scene::{LabelMap, SceneRecord, SceneSet};
pub use sink::{LogSink, MemorySink, StdoutSink, TracingSink};
pub use taxonomy::ClassTaxonomy;
