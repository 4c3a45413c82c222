//! Command line parsing.
//!
//! The option set uses multi-letter single-dash flags (`-sc`, `-so`), so the
//! arguments are matched by hand rather than through a derive parser.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use crate::filter::{Axis, FilterFamily, FilterRequest};

pub const USAGE: &str = "\
Description: Takes an input file and implements edge detection using one of four filters, either
Scharr, Sobel, Prewitt, or Roberts. Accepts png, jpeg, bmp and tiff images. Can accept a list of
images as inputs, and will process all of them sequentially. The list should be a text file with the
name of each image to be processed on a separate line.

Usage: edgedetect input_file [output_file] [options]

Options:

-h                 displays this information
-p                 use Prewitt filter
-r                 use Roberts filter
-sc                use Scharr filter
-so                use Sobel filter (default)
-t                 display timing information to console
-x                 filter along x-axis (default)
-y                 filter along y-axis

Environment:

EDGEDETECT_BACKEND   auto, gpu or host (default auto)
EDGEDETECT_LOG       log level or filter directives (default info)
EDGEDETECT_LOG_DIR   also write daily log files into this directory
";

pub const INVALID_ARGUMENT: &str =
    "Invalid argument to edgedetect. For usage information, use \"edgedetect -h\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub request: FilterRequest,
    pub timing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print usage and exit successfully.
    Help,
    /// An unrecognized option was given.
    Invalid(OsString),
    Run(CliOptions),
}

fn is_option(arg: &OsStr) -> bool {
    arg.as_encoded_bytes().first() == Some(&b'-')
}

/// Parses the arguments that follow the program name.
///
/// Paths are kept as given, so names that are not valid Unicode still reach
/// the decoder. Options in the same group override each other; the last one
/// wins. `-h` anywhere after the input short-circuits to [`Command::Help`], as
/// does a missing or empty input.
pub fn parse_args<I, S>(args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into).peekable();

    let input = match args.next() {
        Some(arg) if !arg.is_empty() && !is_option(&arg) => PathBuf::from(arg),
        _ => return Command::Help,
    };

    let output = match args.peek() {
        Some(arg) if !is_option(arg) => args
            .next()
            .filter(|arg| !arg.is_empty())
            .map(PathBuf::from),
        _ => None,
    };

    let mut request = FilterRequest::default();
    let mut timing = false;

    for arg in args {
        match arg.to_str() {
            Some("-h") => return Command::Help,
            Some("-p") => request.family = FilterFamily::Prewitt,
            Some("-r") => request.family = FilterFamily::Roberts,
            Some("-sc") => request.family = FilterFamily::Scharr,
            Some("-so") => request.family = FilterFamily::Sobel,
            Some("-t") => timing = true,
            Some("-x") => request.axis = Axis::Horizontal,
            Some("-y") => request.axis = Axis::Vertical,
            _ => return Command::Invalid(arg),
        }
    }

    Command::Run(CliOptions {
        input,
        output,
        request,
        timing,
    })
}
