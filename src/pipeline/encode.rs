//! Page image encoding: `DynamicImage` → base64 PNG `ImageData` for vision
//! providers.
//!
//! PNG is lossless, which keeps small table digits and subscripts legible;
//! `detail: "high"` asks GPT-4-class models to tile the image instead of
//! downscaling it to a single 512 px overview.

use crate::error::DocumentError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode one rendered page.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(ImageData::new(STANDARD.encode(&buf), "image/png").with_detail("high"))
}

/// Encode every rendered page of a document, in order.
pub fn encode_pages(images: &[DynamicImage]) -> Result<Vec<ImageData>, DocumentError> {
    let encoded = images
        .iter()
        .enumerate()
        .map(|(idx, img)| {
            encode_page(img).map_err(|e| DocumentError::Unreadable {
                detail: format!("page {} encoding failed: {e}", idx + 1),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Encoded {} pages → {} bytes base64",
        encoded.len(),
        encoded.iter().map(|d| d.data.len()).sum::<usize>()
    );
    Ok(encoded)
}
