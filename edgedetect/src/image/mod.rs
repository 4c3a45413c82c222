mod io;
mod stride;
mod tiff;


use std::fmt;
use std::path::Path;

use image as image_lib;

use crate::common::{Error, Result};

pub use stride::{to_tight_buffer, TightBuffer};

use stride::{add_stride_padding, align_stride, strip_stride_padding};

/// Supported image file extensions for writing.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Width and signedness of one sample in a single-channel buffer.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum SampleKind {
    Unsigned8,
    Signed16,
}

impl SampleKind {
    pub fn byte_count(self) -> usize {
        match self {
            SampleKind::Unsigned8 => 1,
            SampleKind::Signed16 => 2,
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::Unsigned8 => write!(f, "u8"),
            SampleKind::Signed16 => write!(f, "i16"),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct BufferDesc {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
    pub sample: SampleKind,
}

impl BufferDesc {
    /// Descriptor with the row stride rounded up to 4 bytes.
    pub fn new(width: u32, height: u32, sample: SampleKind) -> Self {
        Self {
            width,
            height,
            stride: align_stride(width as usize * sample.byte_count()),
            sample,
        }
    }

    /// Descriptor without any inter-row padding.
    pub fn new_tight(width: u32, height: u32, sample: SampleKind) -> Self {
        Self {
            width,
            height,
            stride: width as usize * sample.byte_count(),
            sample,
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.height as usize * self.stride
    }

    /// Returns the number of bytes per row without padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.sample.byte_count()
    }

    /// Returns true if stride equals row bytes (no padding).
    pub fn is_tight(&self) -> bool {
        self.stride == self.row_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the same geometry with the padding removed.
    pub fn tight(self) -> Self {
        Self {
            stride: self.row_bytes(),
            ..self
        }
    }
}

impl fmt::Display for BufferDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} (stride {})",
            self.width, self.height, self.sample, self.stride
        )
    }
}

/// Single-channel 2-D sample grid in host memory.
///
/// Geometry, stride and sample kind are fixed at construction.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    desc: BufferDesc,
    bytes: Vec<u8>,
}

impl PixelBuffer {
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn new_zeroed(desc: BufferDesc) -> Result<PixelBuffer> {
        validate_stride(&desc)?;

        Ok(PixelBuffer {
            desc,
            bytes: vec![0; desc.size_in_bytes()],
        })
    }

    pub fn new_with_data(desc: BufferDesc, bytes: Vec<u8>) -> Result<PixelBuffer> {
        validate_stride(&desc)?;

        if bytes.len() != desc.size_in_bytes() {
            return Err(Error::InvalidBuffer(format!(
                "bytes length {} does not match expected size {}",
                bytes.len(),
                desc.size_in_bytes()
            )));
        }

        Ok(PixelBuffer { desc, bytes })
    }

    /// Builds an 8-bit buffer from tightly packed rows, padding the stride to 4 bytes.
    pub fn from_gray8(width: u32, height: u32, packed: Vec<u8>) -> Result<PixelBuffer> {
        let tight = BufferDesc::new_tight(width, height, SampleKind::Unsigned8);
        if packed.len() != tight.size_in_bytes() {
            return Err(Error::InvalidBuffer(format!(
                "bytes length {} does not match {}x{}",
                packed.len(),
                width,
                height
            )));
        }

        let desc = BufferDesc::new(width, height, SampleKind::Unsigned8);
        let bytes = add_stride_padding(packed, desc.row_bytes(), height as usize, desc.stride);

        Ok(PixelBuffer { desc, bytes })
    }

    /// Decodes an image file as 8-bit grayscale.
    pub fn read_file<P: AsRef<Path>>(filename: P) -> Result<PixelBuffer> {
        io::decode(filename.as_ref())
    }

    /// Encodes the buffer to a file, picking the format from the extension.
    pub fn save_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let filename = filename.as_ref();
        let extension = filename
            .extension()
            .and_then(|os_str| os_str.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| Error::Encode {
                path: filename.to_path_buf(),
                reason: "missing file extension".to_string(),
            })?;

        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::Encode {
                path: filename.to_path_buf(),
                reason: format!("unsupported file extension: {}", extension),
            });
        }

        // Encoders expect tightly packed rows
        let image = if self.desc.is_tight() {
            std::borrow::Cow::Borrowed(self)
        } else {
            std::borrow::Cow::Owned(self.clone().tight())
        };

        match extension.as_str() {
            "png" => io::save_8bit(&image, filename, image_lib::ImageFormat::Png),
            "jpeg" | "jpg" => io::save_8bit(&image, filename, image_lib::ImageFormat::Jpeg),
            "bmp" => io::save_8bit(&image, filename, image_lib::ImageFormat::Bmp),
            "tiff" | "tif" => tiff::save_tiff(&image, filename),
            _ => Err(Error::Encode {
                path: filename.to_path_buf(),
                reason: format!("unsupported file extension: {}", extension),
            }),
        }
    }

    /// Returns the unpadded bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.desc.stride;
        &self.bytes[start..start + self.desc.row_bytes()]
    }

    /// Returns the sample at (x, y) widened to `i32`.
    pub fn sample(&self, x: u32, y: u32) -> i32 {
        let row = self.row(y);
        match self.desc.sample {
            SampleKind::Unsigned8 => row[x as usize] as i32,
            SampleKind::Signed16 => {
                let i = x as usize * 2;
                i16::from_ne_bytes([row[i], row[i + 1]]) as i32
            }
        }
    }

    /// Returns a buffer with tightly packed rows (stride equals row bytes).
    pub fn tight(self) -> PixelBuffer {
        if self.desc.is_tight() {
            return self;
        }

        let bytes = strip_stride_padding(
            &self.bytes,
            self.desc.row_bytes(),
            self.desc.height as usize,
            self.desc.stride,
        );

        PixelBuffer {
            desc: self.desc.tight(),
            bytes,
        }
    }

    /// Converts a signed 16-bit buffer to 8 bits, saturating to `[0, 255]`.
    pub fn saturate_to_u8(&self) -> PixelBuffer {
        match self.desc.sample {
            SampleKind::Unsigned8 => self.clone(),
            SampleKind::Signed16 => {
                let desc =
                    BufferDesc::new_tight(self.desc.width, self.desc.height, SampleKind::Unsigned8);
                let mut bytes = Vec::with_capacity(desc.size_in_bytes());
                for y in 0..self.desc.height {
                    bytes.extend(
                        self.row(y)
                            .chunks_exact(2)
                            .map(|c| i16::from_ne_bytes([c[0], c[1]]).clamp(0, 255) as u8),
                    );
                }

                PixelBuffer { desc, bytes }
            }
        }
    }
}

fn validate_stride(desc: &BufferDesc) -> Result<()> {
    if desc.stride < desc.row_bytes() {
        return Err(Error::InvalidBuffer(format!(
            "stride {} is smaller than row size {}",
            desc.stride,
            desc.row_bytes()
        )));
    }

    Ok(())
}
