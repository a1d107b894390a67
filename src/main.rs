use std::{error::Error, fs::File, path::PathBuf};

use clap::Parser;
use segeval::{store, ClassTaxonomy, Evaluator, LogSink, StdoutSink, TracingSink};

/// Computes per-class and mean IoU of semantic predictions.
#[derive(Parser, Debug)]
#[command(name = "segeval")]
struct Args {
    /// Scene file (`.json` or `.parquet`) holding ground-truth and predicted ids.
    scenes: PathBuf,

    /// Taxonomy JSON (`{"labels": [...], "ids": [...]}`); defaults to YCB-Video.
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Fold scenes on all cores.
    #[arg(long)]
    parallel: bool,

    /// Also write the report as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Log through `tracing` instead of plain stdout.
    #[arg(long)]
    tracing: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let taxonomy = match &args.taxonomy {
        Some(path) => ClassTaxonomy::load_from_file(&mut File::open(path)?)?,
        None => ClassTaxonomy::ycb_video(),
    };

    let mut sink: Box<dyn LogSink> = if args.tracing {
        tracing_subscriber::fmt().init();
        Box::new(TracingSink)
    } else {
        Box::new(StdoutSink)
    };

    let scenes = store::load_path(&args.scenes)?;
    let evaluator = Evaluator::new(taxonomy).parallel(args.parallel);

    let report = match evaluator.evaluate(&scenes, sink.as_mut()) {
        Ok(report) => report,
        Err(err @ segeval::Error::ShapeMismatch { .. }) => {
            eprintln!("ERROR: {err}");
            std::process::exit(2);
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(path) = &args.json {
        report.save_to_file(&mut File::create(path)?)?;
    }

    Ok(())
}
