//! Detection overlay geometry.
//!
//! `layout` turns detections into a display list any renderer can replay;
//! `annotate_frame` rasterises the boxes and label backgrounds onto a JPEG.
//! Colours and font metrics are cosmetic.

use crate::db::models::Detection;
use crate::error::Error;
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

pub const LABEL_PADDING: f32 = 10.0;
pub const LABEL_HEIGHT: f32 = 20.0;
pub const LINE_WIDTH: f32 = 3.0;

/// Average glyph advance as a share of the font size
const GLYPH_ADVANCE: f32 = 0.55;

pub type Rgba = [u8; 4];

const WHITE: Rgba = [255, 255, 255, 255];
const BLACK: Rgba = [0, 0, 0, 255];
const LIVE_GREEN: Rgba = [0, 255, 0, 255];
const LIVE_LABEL: Rgba = [0, 255, 0, 204];

/// Which view the overlay is drawn for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayStyle {
    /// Mock detector view: per-class colours, `car 87.5%`
    Mock,
    /// Live feed view: green boxes, `car: 87.5%`
    Live,
}

impl OverlayStyle {
    fn font_px(&self) -> f32 {
        match self {
            OverlayStyle::Mock => 14.0,
            OverlayStyle::Live => 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawOp {
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
        color: Rgba,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        font_px: f32,
        color: Rgba,
    },
}

pub fn class_color(class_name: &str) -> Rgba {
    match class_name {
        "car" => [0x3b, 0x82, 0xf6, 255],
        "truck" => [0xef, 0x44, 0x44, 255],
        "bus" => [0x8b, 0x5c, 0xf6, 255],
        "motorcycle" => [0xf5, 0x9e, 0x0b, 255],
        "person" => [0x10, 0xb9, 0x81, 255],
        "bicycle" => [0x06, 0xb6, 0xd4, 255],
        _ => [0x6b, 0x72, 0x80, 255],
    }
}

/// Class name and confidence with one decimal
pub fn label(detection: &Detection, style: OverlayStyle) -> String {
    let percent = detection.confidence * 100.0;
    match style {
        OverlayStyle::Mock => format!("{} {:.1}%", detection.class_name, percent),
        OverlayStyle::Live => format!("{}: {:.1}%", detection.class_name, percent),
    }
}

/// Estimated rendered width of `text`
pub fn text_width(text: &str, font_px: f32) -> f32 {
    text.chars().count() as f32 * font_px * GLYPH_ADVANCE
}

/// Box, label background and label text for every detection
pub fn layout(detections: &[Detection], style: OverlayStyle) -> Vec<DrawOp> {
    let font_px = style.font_px();
    let mut ops = Vec::with_capacity(detections.len() * 3);

    for detection in detections {
        let bbox = detection.bbox;
        let (box_color, label_color, text_color) = match style {
            OverlayStyle::Mock => {
                let color = class_color(&detection.class_name);
                (color, color, WHITE)
            }
            OverlayStyle::Live => (LIVE_GREEN, LIVE_LABEL, BLACK),
        };
        let text = label(detection, style);

        ops.push(DrawOp::StrokeRect {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            line_width: LINE_WIDTH,
            color: box_color,
        });
        ops.push(DrawOp::FillRect {
            x: bbox.x,
            y: bbox.y - LABEL_HEIGHT,
            width: text_width(&text, font_px) + LABEL_PADDING,
            height: LABEL_HEIGHT,
            color: label_color,
        });
        ops.push(DrawOp::Text {
            x: bbox.x + LABEL_PADDING / 2.0,
            y: bbox.y - 5.0,
            text,
            font_px,
            color: text_color,
        });
    }

    ops
}

/// Decode a base64 JPEG frame
pub fn decode_frame(frame: &str) -> Result<RgbImage> {
    let bytes = STANDARD
        .decode(frame.trim())
        .map_err(|e| Error::Decode(format!("Invalid base64 frame: {}", e)))?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
        .map_err(|e| Error::Decode(format!("Invalid JPEG frame: {}", e)))?;
    Ok(image.to_rgb8())
}

/// Encode an image as a base64 JPEG frame
pub fn encode_frame(image: &RgbImage) -> Result<String> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(|e| Error::Internal(format!("Failed to encode JPEG frame: {}", e)))?;
    Ok(STANDARD.encode(bytes))
}

/// Draw the overlay rectangles onto a base64 JPEG and re-encode it.
///
/// Text ops are skipped; there is no font rasteriser here.
pub fn annotate_frame(frame: &str, detections: &[Detection], style: OverlayStyle) -> Result<String> {
    let mut image = decode_frame(frame)?;
    draw_overlay(&mut image, detections, style);
    encode_frame(&image)
}

/// Rasterise box outlines and label backgrounds onto `image`
pub fn draw_overlay(image: &mut RgbImage, detections: &[Detection], style: OverlayStyle) {
    for op in layout(detections, style) {
        match op {
            DrawOp::StrokeRect {
                x,
                y,
                width,
                height,
                line_width,
                color,
            } => {
                let t = line_width;
                fill_rect(image, x, y, width, t, color);
                fill_rect(image, x, y + height - t, width, t, color);
                fill_rect(image, x, y, t, height, color);
                fill_rect(image, x + width - t, y, t, height, color);
            }
            DrawOp::FillRect {
                x,
                y,
                width,
                height,
                color,
            } => fill_rect(image, x, y, width, height, color),
            DrawOp::Text { .. } => {}
        }
    }
}

/// Alpha-blend a rectangle, clipped to the image
fn fill_rect(image: &mut RgbImage, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
    let (w, h) = image.dimensions();
    let x0 = x.max(0.0).floor() as u32;
    let y0 = y.max(0.0).floor() as u32;
    let x1 = ((x + width).max(0.0).ceil() as u32).min(w);
    let y1 = ((y + height).max(0.0).ceil() as u32).min(h);
    let alpha = color[3] as f32 / 255.0;

    for py in y0..y1 {
        for px in x0..x1 {
            let Rgb(current) = *image.get_pixel(px, py);
            let mut blended = [0u8; 3];
            for c in 0..3 {
                blended[c] = (color[c] as f32 * alpha + current[c] as f32 * (1.0 - alpha)).round() as u8;
            }
            image.put_pixel(px, py, Rgb(blended));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BoundingBox;

    fn car() -> Detection {
        Detection {
            class_name: "car".to_string(),
            confidence: 0.875,
            bbox: BoundingBox {
                x: 40.0,
                y: 60.0,
                width: 100.0,
                height: 50.0,
            },
            class_id: Some(2),
        }
    }

    #[test]
    fn labels_follow_style() {
        assert_eq!(label(&car(), OverlayStyle::Mock), "car 87.5%");
        assert_eq!(label(&car(), OverlayStyle::Live), "car: 87.5%");
    }

    #[test]
    fn label_background_sits_above_box() {
        let ops = layout(&[car()], OverlayStyle::Mock);
        assert_eq!(ops.len(), 3);

        let DrawOp::FillRect { x, y, width, height, color } = ops[1] else {
            panic!("expected label background");
        };
        assert_eq!((x, y, height), (40.0, 40.0, LABEL_HEIGHT));
        assert_eq!(width, text_width("car 87.5%", 14.0) + LABEL_PADDING);
        assert_eq!(color, class_color("car"));
    }

    #[test]
    fn empty_frame_has_no_ops() {
        assert!(layout(&[], OverlayStyle::Live).is_empty());
    }

    #[test]
    fn annotates_jpeg_frame() {
        let frame = encode_frame(&RgbImage::from_pixel(160, 120, Rgb([0, 0, 0]))).unwrap();
        let annotated = annotate_frame(&frame, &[car()], OverlayStyle::Live).unwrap();

        let image = decode_frame(&annotated).unwrap();
        assert_eq!(image.dimensions(), (160, 120));
        // Left edge of the box is drawn in green
        let Rgb([r, g, b]) = *image.get_pixel(41, 85);
        assert!(g > r.saturating_add(60) && g > b.saturating_add(60));
    }

    #[test]
    fn rejects_garbage_frames() {
        assert!(annotate_frame("!!!", &[], OverlayStyle::Mock).is_err());
        assert!(annotate_frame(&STANDARD.encode(b"not a jpeg"), &[], OverlayStyle::Mock).is_err());
    }
}
