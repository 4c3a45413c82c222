use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::common::{Error, ListRole, Result};
use crate::pipeline::Pipeline;

/// Outcome of a list run. Failures of single images never stop the run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Written output paths, in list order.
    pub processed: Vec<PathBuf>,
    /// Inputs that failed, with the reason.
    pub failures: Vec<(PathBuf, Error)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.processed.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// A list file read line by line as raw bytes.
///
/// Lines are file names, which need not be valid UTF-8.
struct ListReader {
    path: PathBuf,
    lines: Option<io::Split<BufReader<File>>>,
}

impl ListReader {
    fn open(path: &Path, role: ListRole) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::ListOpen {
            role,
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: Some(BufReader::new(file).split(b'\n')),
        })
    }

    /// Next line with its terminator stripped, CRLF included.
    ///
    /// A read error ends the list.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let lines = self.lines.as_mut()?;
        match lines.next()? {
            Ok(mut line) => {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Some(line)
            }
            Err(e) => {
                tracing::error!("Error reading {}: {}", self.path.display(), e);
                self.lines = None;
                None
            }
        }
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> std::result::Result<PathBuf, Vec<u8>> {
    use std::os::unix::ffi::OsStringExt;

    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> std::result::Result<PathBuf, Vec<u8>> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| e.into_bytes())
}

fn lossy_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Runs `pipeline` over every path in `input_list`.
///
/// When `output_list` is given its lines name the outputs in lockstep; a
/// missing or blank line falls back to the derived name. Both lists are opened
/// before any image is processed and failing to open either aborts the run.
pub fn run_list(
    pipeline: &Pipeline<'_>,
    input_list: &Path,
    output_list: Option<&Path>,
) -> Result<BatchReport> {
    let mut inputs = ListReader::open(input_list, ListRole::Input)?;
    let mut outputs = match output_list {
        Some(path) => Some(ListReader::open(path, ListRole::Output)?),
        None => None,
    };

    let mut report = BatchReport::default();

    while let Some(input) = inputs.next_line() {
        // Keep the output list aligned with the input list, blank lines included.
        let output = outputs
            .as_mut()
            .and_then(ListReader::next_line)
            .filter(|name| !name.is_empty());

        if input.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!("Skipping blank line in {}", input_list.display());
            continue;
        }

        let input = match path_from_bytes(input) {
            Ok(path) => path,
            Err(bytes) => {
                let path = lossy_path(&bytes);
                let e = Error::Decode {
                    path: path.clone(),
                    reason: "file name is not valid on this platform".to_string(),
                };
                tracing::error!("{}", e);
                report.failures.push((path, e));
                continue;
            }
        };

        let output = match output.map(path_from_bytes).transpose() {
            Ok(output) => output,
            Err(bytes) => {
                let e = Error::Encode {
                    path: lossy_path(&bytes),
                    reason: "file name is not valid on this platform".to_string(),
                };
                tracing::error!("{}", e);
                report.failures.push((input, e));
                continue;
            }
        };

        match pipeline.process_image(&input, output.as_deref()) {
            Ok(written) => report.processed.push(written),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!("{}", e);
                report.failures.push((input, e));
            }
        }
    }

    tracing::info!(
        "Processed {} images from {}, {} failed",
        report.succeeded() + report.failed(),
        input_list.display(),
        report.failed()
    );

    Ok(report)
}
