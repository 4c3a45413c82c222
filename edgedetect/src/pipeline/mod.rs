#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::common::{Error, Result};
use crate::device::AcceleratorContext;
use crate::filter::{select_operation, FilterRequest};
use crate::image::{to_tight_buffer, PixelBuffer};
use crate::timing::ProcessingTimestamps;
use crate::transfer;

/// Inserted before the extension of auto-named outputs.
pub const OUTPUT_SUFFIX: &str = "_edges";

/// Derives an output name by inserting `_edges` before the last `.` of the
/// file name, or appending it when the file name has no `.`.
///
/// Directory components are never touched.
pub fn make_output_file_name(input: &Path) -> PathBuf {
    let Some(name) = input.file_name() else {
        let mut path = input.as_os_str().to_owned();
        path.push(OUTPUT_SUFFIX);
        return PathBuf::from(path);
    };

    let mut output_name = OsString::new();
    match (input.file_stem(), input.extension()) {
        (Some(stem), Some(extension)) => {
            output_name.push(stem);
            output_name.push(OUTPUT_SUFFIX);
            output_name.push(".");
            output_name.push(extension);
        }
        // A name whose only `.` leads it, such as ".png".
        _ if name.as_encoded_bytes().first() == Some(&b'.') => {
            output_name.push(OUTPUT_SUFFIX);
            output_name.push(name);
        }
        _ => {
            output_name.push(name);
            output_name.push(OUTPUT_SUFFIX);
        }
    }

    input.with_file_name(output_name)
}

/// Filters single images with one request on one accelerator.
#[derive(Debug)]
pub struct Pipeline<'a> {
    context: &'a AcceleratorContext,
    request: FilterRequest,
    timing: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(context: &'a AcceleratorContext, request: FilterRequest, timing: bool) -> Self {
        Self {
            context,
            request,
            timing,
        }
    }

    /// Decodes `input`, filters it on the device and writes the result.
    ///
    /// Without `output` the name is derived with [`make_output_file_name`].
    /// Returns the path that was written.
    pub fn process_image(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
        let output = match output {
            Some(path) => path.to_path_buf(),
            None => make_output_file_name(input),
        };

        let mut timestamps = ProcessingTimestamps::start();

        let image = PixelBuffer::read_file(input)?;
        if image.desc().is_empty() {
            return Err(Error::Decode {
                path: input.to_path_buf(),
                reason: "image is empty".to_string(),
            });
        }
        timestamps.mark_loaded();
        tracing::info!("Input image {} loaded.", input.display());

        let tight = to_tight_buffer(&image);
        let (op, output_kind) = select_operation(self.request);
        tracing::debug!("Selected {} with {} output", op, output_kind);

        let filtered = transfer::execute(self.context, op, output_kind, &tight, &mut timestamps)?;

        let written = filtered.save_file(&output);
        if self.timing {
            if let Some(report) = timestamps.finish(Instant::now()) {
                println!("{}", report);
            }
        }
        written?;

        tracing::info!("Output image {} successfully written.", output.display());

        Ok(output)
    }
}
