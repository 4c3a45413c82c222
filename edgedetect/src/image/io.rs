use std::path::Path;

use image as image_lib;

use super::{PixelBuffer, SampleKind};
use crate::common::{Error, Result};

/// Reads any supported image format as 8-bit luma.
///
/// The format is sniffed from the file contents, falling back to the
/// extension. Zero-size images are rejected.
pub(crate) fn decode(path: &Path) -> Result<PixelBuffer> {
    let decode_err = |reason: String| Error::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let img = image_lib::ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(decode_err(format!(
            "image is empty ({}x{})",
            img.width(),
            img.height()
        )));
    }

    let gray = img.into_luma8();
    let (width, height) = gray.dimensions();

    PixelBuffer::from_gray8(width, height, gray.into_raw())
}

/// Writes an 8-bit grayscale file; signed samples are saturated first.
pub(crate) fn save_8bit(
    image: &PixelBuffer,
    filename: &Path,
    format: image_lib::ImageFormat,
) -> Result<()> {
    debug_assert!(image.desc().is_tight(), "Image must be packed before saving");

    let converted;
    let image = match image.desc().sample {
        SampleKind::Unsigned8 => image,
        SampleKind::Signed16 => {
            tracing::debug!(
                "{:?} cannot store signed 16-bit samples, saturating to 8 bits",
                format
            );
            converted = image.saturate_to_u8();
            &converted
        }
    };

    image_lib::save_buffer_with_format(
        filename,
        image.bytes(),
        image.desc().width,
        image.desc().height,
        image_lib::ColorType::L8,
        format,
    )
    .map_err(|e| Error::Encode {
        path: filename.to_path_buf(),
        reason: e.to_string(),
    })
}
