//! Annotation crops for the extraction service

use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat, RgbaImage};

use crate::geometry::{BBox, Rotation};

use super::RenderError;

/// An encoded crop and the integer box it was cut from.
#[derive(Debug, Clone)]
pub struct Crop {
    pub bbox: [i64; 4],
    pub png: Vec<u8>,
}

/// Cut `bbox` out of the page, rotated the way the user sees it.
///
/// The box is rounded to whole pixels and clamped to the image first, so the
/// integer box returned is exactly the region the crop shows.
pub fn crop_for_extraction(
    image: &RgbaImage,
    bbox: BBox,
    rotation: Rotation,
) -> Result<Crop, RenderError> {
    let (width, height) = image.dimensions();
    let [x1, y1, x2, y2] = bbox.to_integer();
    let clamp_x = |v: i64| v.clamp(0, width as i64);
    let clamp_y = |v: i64| v.clamp(0, height as i64);
    let (x1, x2) = (clamp_x(x1), clamp_x(x2));
    let (y1, y2) = (clamp_y(y1), clamp_y(y2));

    if x2 <= x1 || y2 <= y1 {
        return Err(RenderError::EmptyCrop {
            bbox: bbox.to_integer(),
        });
    }

    let region = imageops::crop_imm(
        image,
        x1 as u32,
        y1 as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    )
    .to_image();

    let rotated = match rotation {
        Rotation::Deg0 => region,
        Rotation::Deg90 => imageops::rotate90(&region),
        Rotation::Deg180 => imageops::rotate180(&region),
        Rotation::Deg270 => imageops::rotate270(&region),
    };

    Ok(Crop {
        bbox: [x1, y1, x2, y2],
        png: encode_png(rotated)?,
    })
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}
