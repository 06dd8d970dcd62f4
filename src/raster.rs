//! An in-memory RGBA [`Canvas`], used headlessly and as the GUI overlay texture.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::overlay::{Canvas, PointF, RectF, Stroke};
use crate::types::Size;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Glyph cell is 5×7 font pixels, each drawn as a `GLYPH_SCALE`² block.
const GLYPH_SCALE: u32 = 2;
const GLYPH_ROWS: u32 = 7;
const GLYPH_ADVANCE: u32 = 6 * GLYPH_SCALE;

#[derive(Debug, Clone)]
pub struct RasterCanvas {
    image: RgbaImage,
    revision: u64,
}

impl Default for RasterCanvas {
    fn default() -> Self {
        Self::new(Size::new(0, 0))
    }
}

impl RasterCanvas {
    pub fn new(size: Size) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
            revision: 0,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn size(&self) -> Size {
        let (width, height) = self.image.dimensions();
        Size::new(width, height)
    }

    /// Bumped on every mutation; lets a GUI skip re-uploading an unchanged texture.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True if nothing but transparent pixels is on the canvas.
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p[3] == 0)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn line(&mut self, a: PointF, b: PointF, stroke: Stroke) {
        let thickness = stroke.width.round().max(1.0) as i32;
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let length = (dx * dx + dy * dy).sqrt();
        // Unit normal; a zero-length segment still paints a dot.
        let (nx, ny) = if length > 0.0 {
            (-dy / length, dx / length)
        } else {
            (0.0, 1.0)
        };
        let first = -(thickness - 1) as f32 / 2.0;
        for t in 0..thickness {
            let offset = first + t as f32;
            draw_line_segment_mut(
                &mut self.image,
                (a.x + nx * offset, a.y + ny * offset),
                (b.x + nx * offset, b.y + ny * offset),
                stroke.color,
            );
        }
    }

    /// Parameter interval of `a -> b` inside the canvas grown by `margin` on
    /// every side (Liang-Barsky). `None` if the segment misses it entirely.
    fn visible_span(&self, a: PointF, b: PointF, margin: f64) -> Option<(f64, f64)> {
        let (w, h) = self.image.dimensions();
        let (ax, ay) = (a.x as f64, a.y as f64);
        let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
        let (min_x, min_y) = (-margin, -margin);
        let (max_x, max_y) = (w as f64 + margin, h as f64 + margin);

        let mut span = (0.0, 1.0);
        for (p, q) in [(-dx, ax - min_x), (dx, max_x - ax), (-dy, ay - min_y), (dy, max_y - ay)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > span.1 {
                    return None;
                }
                span.0 = f64::max(span.0, r);
            } else {
                if r < span.0 {
                    return None;
                }
                span.1 = f64::min(span.1, r);
            }
        }
        Some(span)
    }

    /// Stroke one segment, honouring the dash pattern. `phase` is the distance
    /// already travelled along the path and is returned advanced.
    ///
    /// Only the part near the canvas is stepped, so the cost is bounded by the
    /// canvas size however long the segment is. The dash phase still counts
    /// from the unclipped start.
    fn dashed_segment(&mut self, a: PointF, b: PointF, stroke: Stroke, phase: f64) -> f64 {
        let (dx, dy) = (b.x as f64 - a.x as f64, b.y as f64 - a.y as f64);
        let length = (dx * dx + dy * dy).sqrt();
        let margin = stroke.width.max(1.0) as f64 + 1.0;
        let Some((start, end)) = self.visible_span(a, b, margin) else {
            return phase + length;
        };
        let point_at = |t: f64| PointF::new((a.x as f64 + dx * t) as f32, (a.y as f64 + dy * t) as f32);

        let Some((on, off)) = stroke.dash.filter(|(on, off)| *on > 0.0 && on + off > 0.0) else {
            self.line(point_at(start), point_at(end), stroke);
            return phase + length;
        };
        if length == 0.0 {
            return phase;
        }

        let (on, period) = (on as f64, (on + off) as f64);
        let stop = end * length;
        let mut travelled = start * length;
        while travelled < stop {
            let in_period = (phase + travelled) % period;
            let (drawing, remaining) = if in_period < on {
                (true, on - in_period)
            } else {
                (false, period - in_period)
            };
            let next = travelled + remaining.min(stop - travelled);
            if next <= travelled {
                break;
            }
            if drawing {
                self.line(point_at(travelled / length), point_at(next / length), stroke);
            }
            travelled = next;
        }
        phase + length
    }

    fn glyph_block(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        let (w, h) = self.image.dimensions();
        for dy in 0..GLYPH_SCALE as i32 {
            for dx in 0..GLYPH_SCALE as i32 {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                    self.image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

impl Canvas for RasterCanvas {
    fn resize(&mut self, size: Size) {
        if self.size() != size {
            self.image = RgbaImage::new(size.width, size.height);
            self.touch();
        }
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
        self.touch();
    }

    fn stroke_rect(&mut self, rect: RectF, stroke: Stroke) {
        let corners = [
            PointF::new(rect.x, rect.y),
            PointF::new(rect.right(), rect.y),
            PointF::new(rect.right(), rect.bottom()),
            PointF::new(rect.x, rect.bottom()),
            PointF::new(rect.x, rect.y),
        ];
        self.stroke_polyline(&corners, stroke);
    }

    fn stroke_polyline(&mut self, points: &[PointF], stroke: Stroke) {
        let mut phase = 0.0;
        for pair in points.windows(2) {
            phase = self.dashed_segment(pair[0], pair[1], stroke, phase);
        }
        self.touch();
    }

    fn fill_rect(&mut self, rect: RectF, color: Rgba<u8>) {
        let (w, h) = self.image.dimensions();
        let (left, top) = (rect.x.round(), rect.y.round());
        let right = (left + rect.width.round()).min(w as f32);
        let bottom = (top + rect.height.round()).min(h as f32);
        let (left, top) = (left.max(0.0), top.max(0.0));
        if right - left < 1.0 || bottom - top < 1.0 {
            return;
        }
        let area = Rect::at(left as i32, top as i32)
            .of_size((right - left) as u32, (bottom - top) as u32);
        draw_filled_rect_mut(&mut self.image, area, color);
        self.touch();
    }

    fn fill_text(&mut self, origin: PointF, text: &str, color: Rgba<u8>) {
        let top = (origin.y - (GLYPH_ROWS * GLYPH_SCALE) as f32 / 2.0).round() as i32;
        let mut left = origin.x.round() as i32;
        for ch in text.chars() {
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..5 {
                    if bits & (1 << (4 - col)) != 0 {
                        self.glyph_block(
                            left + (col * GLYPH_SCALE) as i32,
                            top + row as i32 * GLYPH_SCALE as i32,
                            color,
                        );
                    }
                }
            }
            left += GLYPH_ADVANCE as i32;
        }
        self.touch();
    }

    fn measure_text(&self, text: &str) -> f32 {
        match text.chars().count() as u32 {
            0 => 0.0,
            n => (n * GLYPH_ADVANCE - GLYPH_SCALE) as f32,
        }
    }
}

/// 5×7 bitmap rows, most significant of the low five bits on the left.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'F' | 'f' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'a' | 'A' => [0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111],
        'c' | 'C' => [0b00000, 0b00000, 0b01110, 0b10000, 0b10000, 0b10001, 0b01110],
        'e' | 'E' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b01110, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b10000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
        ' ' => [0; 7],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}

/// The preview scaled to the overlay size with the overlay blended on top.
pub fn composite(base: &RgbaImage, overlay: &RgbaImage) -> RgbaImage {
    let (width, height) = overlay.dimensions();
    let mut out = if base.dimensions() == (width, height) {
        base.clone()
    } else {
        imageops::resize(base, width, height, FilterType::Triangle)
    };
    imageops::overlay(&mut out, overlay, 0, 0);
    out
}
