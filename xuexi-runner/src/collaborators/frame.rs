//! Frame helpers: cropping, compositing and JPEG encoding

use super::{CollaboratorResult, Frame, Region};
use image::{codecs::jpeg::JpegEncoder, imageops, Rgb};

/// JPEG quality used for evidence files and oracle uploads
pub const JPEG_QUALITY: u8 = 90;

/// Crop `region` out of `frame`, clipped to the frame bounds
///
/// Returns `None` when nothing of the region lies inside the frame.
pub fn crop(frame: &Frame, region: Region) -> Option<Frame> {
    let (width, height) = (frame.width() as i64, frame.height() as i64);

    let x0 = (region.x as i64).clamp(0, width);
    let y0 = (region.y as i64).clamp(0, height);
    let x1 = (region.x as i64 + region.w as i64).clamp(0, width);
    let y1 = (region.y as i64 + region.h as i64).clamp(0, height);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(
        imageops::crop_imm(
            frame,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image(),
    )
}

/// Stack frames top to bottom on a white canvas as wide as the widest frame
pub fn stack_vertical(frames: &[Frame]) -> Frame {
    let width = frames.iter().map(|f| f.width()).max().unwrap_or(0);
    let height = frames.iter().map(|f| f.height()).sum();

    let mut canvas = Frame::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut y = 0i64;
    for frame in frames {
        imageops::replace(&mut canvas, frame, 0, y);
        y += frame.height() as i64;
    }
    canvas
}

/// Encode a frame as JPEG
pub fn encode_jpeg(frame: &Frame) -> CollaboratorResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(frame)?;
    Ok(buf)
}
