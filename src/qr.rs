//! QR codes pointing at a published report.

use std::fmt;
use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Luma};
use qrcode::QrCode;

/// Pixel size of one QR module.
pub const MODULE_SIZE_PX: u32 = 10;

/// Errors raised while producing a QR image.
#[derive(Debug)]
pub enum QrError {
    /// The payload does not fit into any QR version.
    Encode(qrcode::types::QrError),
    /// PNG encoding failed.
    Image(image::ImageError),
}

impl fmt::Display for QrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "Failed to encode QR data: {err}"),
            Self::Image(err) => write!(f, "Failed to write QR image: {err}"),
        }
    }
}

impl std::error::Error for QrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(_) => None,
            Self::Image(err) => Some(err),
        }
    }
}

impl From<qrcode::types::QrError> for QrError {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::Encode(err)
    }
}

impl From<image::ImageError> for QrError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

/// Encodes `data` as a black-on-white QR code PNG with a quiet zone.
pub fn encode_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::new(data.as_bytes())?;
    let buffer = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_SIZE_PX, MODULE_SIZE_PX)
        .quiet_zone(true)
        .build();

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(buffer).write_to(&mut png, ImageOutputFormat::Png)?;
    Ok(png.into_inner())
}
