use std::fs::File;
use std::path::Path;

use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};

use super::{PixelBuffer, SampleKind};
use crate::common::{Error, Result};

/// Writes a single-channel TIFF, keeping signed 16-bit samples as they are.
pub(crate) fn save_tiff(image: &PixelBuffer, filename: &Path) -> Result<()> {
    debug_assert!(image.desc().is_tight(), "Image must be packed before saving");

    let result = match image.desc().sample {
        SampleKind::Unsigned8 => save_tiff_internal::<colortype::Gray8>(image, image.bytes(), filename),
        SampleKind::Signed16 => {
            let samples: Vec<i16> = image
                .bytes()
                .chunks_exact(2)
                .map(|c| i16::from_ne_bytes([c[0], c[1]]))
                .collect();
            save_tiff_internal::<colortype::GrayI16>(image, &samples, filename)
        }
    };

    result.map_err(|reason| Error::Encode {
        path: filename.to_path_buf(),
        reason,
    })
}

fn save_tiff_internal<CT>(
    image: &PixelBuffer,
    data: &[CT::Inner],
    filename: &Path,
) -> std::result::Result<(), String>
where
    CT: ColorType,
    [CT::Inner]: TiffValue,
{
    let mut file = File::create(filename).map_err(|e| e.to_string())?;
    let mut tiff = TiffEncoder::new(&mut file).map_err(|e| e.to_string())?;
    tiff.write_image::<CT>(image.desc().width, image.desc().height, data)
        .map_err(|e| e.to_string())?;

    Ok(())
}
