use std::io::Write;

/// Destination for the informational text of an evaluation run.
///
/// This is a side channel only; nothing written here affects the numbers.
pub trait LogSink {
    /// Writes one line of text.
    fn info(&mut self, line: &str);

    /// Reports how many scenes have been folded so far.
    fn progress(&mut self, processed: usize) {
        self.info(&format!("scans processed: {processed}"));
    }
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    fn info(&mut self, line: &str) {
        (**self).info(line)
    }

    fn progress(&mut self, processed: usize) {
        (**self).progress(processed)
    }
}

/// Writes lines to standard output. Progress overwrites itself on a single line.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn info(&mut self, line: &str) {
        println!("{line}");
    }

    fn progress(&mut self, processed: usize) {
        let mut stdout = std::io::stdout().lock();
        _ = write!(stdout, "\rscans processed: {processed}");
        _ = stdout.flush();
    }
}

/// Forwards lines to `tracing`: text at `info`, progress at `debug`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&mut self, line: &str) {
        tracing::info!("{line}");
    }

    fn progress(&mut self, processed: usize) {
        tracing::debug!(processed, "scans processed");
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
    /// Last progress count seen.
    pub processed: usize,
}

impl LogSink for MemorySink {
    fn info(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }

    fn progress(&mut self, processed: usize) {
        self.processed = processed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(sink: &mut dyn LogSink) {
        sink.info("first");
        sink.progress(3);
        sink.info("second");
    }

    #[test]
    fn memory_sink_collects_lines() {
        let mut sink = MemorySink::default();
        emit(&mut sink);
        assert_eq!(sink.lines, ["first", "second"]);
        assert_eq!(sink.processed, 3);
    }

    #[test]
    fn default_progress_is_a_line() {
        struct Lines(Vec<String>);
        impl LogSink for Lines {
            fn info(&mut self, line: &str) {
                self.0.push(line.to_owned());
            }
        }

        let mut sink = Lines(Vec::new());
        emit(&mut &mut sink);
        assert_eq!(sink.0, ["first", "scans processed: 3", "second"]);
    }
}
