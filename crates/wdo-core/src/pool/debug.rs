//! Single-step debug mode.
//!
//! Before each file the operator is asked whether to mimic a receive failure:
//! `y` requests a deliberately wrong file id, `go` stops asking for the rest
//! of the batch, anything else downloads normally.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::api::{DownloadError, FetchedFile, FileSource};

struct Console {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

pub struct DebugStepper {
    inner: Arc<dyn FileSource>,
    console: Mutex<Console>,
    stepping: AtomicBool,
}

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Proceed,
    MimicFailure,
    RunToEnd,
}

impl DebugStepper {
    pub fn new(
        inner: Arc<dyn FileSource>,
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            inner,
            console: Mutex::new(Console { input, output }),
            stepping: AtomicBool::new(true),
        }
    }

    /// Stepper reading answers from stdin and prompting on stderr.
    pub fn stdio(inner: Arc<dyn FileSource>) -> Self {
        Self::new(
            inner,
            Box::new(io::BufReader::new(io::stdin())),
            Box::new(io::stderr()),
        )
    }

    pub fn is_stepping(&self) -> bool {
        self.stepping.load(Ordering::Relaxed)
    }

    fn ask(&self, order_id: &str, file_id: &str) -> Step {
        let mut console = self.console.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = write!(
            console.output,
            "Order: {} File: {}\nEnter y to mimic a receive failure on file - 'go' to run to end> ",
            order_id, file_id
        );
        let _ = console.output.flush();
        let mut answer = String::new();
        if console.input.read_line(&mut answer).unwrap_or(0) == 0 {
            // Input closed: nobody is there to answer.
            return Step::RunToEnd;
        }
        match answer.trim() {
            "y" => Step::MimicFailure,
            "go" => Step::RunToEnd,
            _ => Step::Proceed,
        }
    }
}

impl FileSource for DebugStepper {
    fn fetch_file(
        &self,
        order_id: &str,
        file_id: &str,
        dest: &Path,
    ) -> Result<FetchedFile, DownloadError> {
        if self.is_stepping() {
            match self.ask(order_id, file_id) {
                Step::MimicFailure => {
                    tracing::info!(file_id, "mimicking receive failure");
                    let broken = format!("{}y", file_id);
                    return self.inner.fetch_file(order_id, &broken, dest);
                }
                Step::RunToEnd => self.stepping.store(false, Ordering::Relaxed),
                Step::Proceed => {}
            }
        }
        self.inner.fetch_file(order_id, file_id, dest)
    }

    fn file_url(&self, order_id: &str, file_id: &str) -> String {
        self.inner.file_url(order_id, file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Records the file ids it was asked for.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl FileSource for Recorder {
        fn fetch_file(
            &self,
            _order_id: &str,
            file_id: &str,
            dest: &Path,
        ) -> Result<FetchedFile, DownloadError> {
            self.seen.lock().unwrap().push(file_id.to_string());
            Ok(FetchedFile {
                time_to_first_byte: Duration::ZERO,
                path: dest.to_path_buf(),
                bytes: 0,
            })
        }

        fn file_url(&self, order_id: &str, file_id: &str) -> String {
            format!("mem://{}/{}", order_id, file_id)
        }
    }

    fn stepper(answers: &str, inner: Arc<Recorder>) -> DebugStepper {
        DebugStepper::new(
            inner,
            Box::new(io::Cursor::new(answers.as_bytes().to_vec())),
            Box::new(io::sink()),
        )
    }

    #[test]
    fn y_mangles_file_id_and_go_stops_asking() {
        let rec = Arc::new(Recorder::default());
        let s = stepper("\ny\ngo\n", Arc::clone(&rec));
        let dest = Path::new("/tmp/x.grib2");
        for f in ["a", "b", "c", "d"] {
            s.fetch_file("o1", f, dest).unwrap();
        }
        assert!(!s.is_stepping());
        assert_eq!(*rec.seen.lock().unwrap(), vec!["a", "by", "c", "d"]);
    }

    #[test]
    fn closed_input_runs_to_end() {
        let rec = Arc::new(Recorder::default());
        let s = stepper("", Arc::clone(&rec));
        s.fetch_file("o1", "a", Path::new("/tmp/a")).unwrap();
        assert!(!s.is_stepping());
        assert_eq!(s.file_url("o1", "a"), "mem://o1/a");
    }
}
