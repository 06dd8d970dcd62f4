//! Face boxes painted over the displayed image.
//!
//! Faces arrive in natural coordinates (pixels of the original image). The
//! preview is usually shown at another size, possibly stretched, so every box
//! is mapped into display coordinates per axis before drawing:
//!
//! ```text
//! scale_x = display_width  / natural_width
//! scale_y = display_height / natural_height
//! ```

use image::Rgba;
use tracing::debug;

use crate::types::{Face, Size};
use crate::view::View;

pub const BOX_COLOR: Rgba<u8> = Rgba([0xff, 0x47, 0x57, 0xff]);
pub const INSET_COLOR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
pub const LABEL_BACKGROUND: Rgba<u8> = Rgba([0xff, 0x47, 0x57, 230]);
pub const LABEL_TEXT: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);

const OUTER_WIDTH: f32 = 3.0;
const OUTER_DASH: (f32, f32) = (8.0, 4.0);
const INSET_WIDTH: f32 = 2.0;
const CORNER_SIZE: f32 = 8.0;
const CORNER_WIDTH: f32 = 2.0;
const LABEL_HEIGHT: f32 = 18.0;
const LABEL_PADDING: f32 = 4.0;
/// Boxes whose top is this close to the container top get their label below.
const LABEL_CLEARANCE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba<u8>,
    pub width: f32,
    /// `(on, off)` lengths; `None` for a solid line.
    pub dash: Option<(f32, f32)>,
}

impl Stroke {
    pub const fn solid(color: Rgba<u8>, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub const fn dashed(color: Rgba<u8>, width: f32, dash: (f32, f32)) -> Self {
        Self {
            color,
            width,
            dash: Some(dash),
        }
    }
}

/// A transparent drawing surface sitting on top of the displayed image.
pub trait Canvas {
    /// Resize to `size`. Contents are unspecified afterwards; call [`Canvas::clear`].
    fn resize(&mut self, size: Size);

    /// Make every pixel transparent.
    fn clear(&mut self);

    fn stroke_rect(&mut self, rect: RectF, stroke: Stroke);

    fn stroke_polyline(&mut self, points: &[PointF], stroke: Stroke);

    fn fill_rect(&mut self, rect: RectF, color: Rgba<u8>);

    /// Draw `text` starting at `origin.x`, vertically centred on `origin.y`.
    fn fill_text(&mut self, origin: PointF, text: &str, color: Rgba<u8>);

    /// Advance width of `text` in pixels.
    fn measure_text(&self, text: &str) -> f32;
}

/// Natural and displayed size of the image under the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub natural: Size,
    pub display: Size,
}

impl ImageGeometry {
    /// `None` while either size is unknown (zero), i.e. the image is not decoded.
    pub fn scale(&self) -> Option<Scale> {
        if self.natural.is_empty() {
            return None;
        }
        Some(Scale {
            x: self.display.width as f32 / self.natural.width as f32,
            y: self.display.height as f32 / self.natural.height as f32,
        })
    }
}

/// Per-axis factors from natural to display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub fn apply(&self, face: &Face) -> RectF {
        RectF::new(
            face.x as f32 * self.x,
            face.y as f32 * self.y,
            face.width as f32 * self.x,
            face.height as f32 * self.y,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub background: RectF,
    /// Left edge and vertical centre of the text.
    pub text_origin: PointF,
    pub below: bool,
}

/// Everything drawn for one face, in display coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMarker {
    /// 1-based position in the response.
    pub index: usize,
    pub rect: RectF,
    pub inset: RectF,
    pub corners: [[PointF; 3]; 4],
    pub label: Label,
}

impl FaceMarker {
    pub fn new(index: usize, rect: RectF, label_text_width: f32) -> Self {
        let RectF {
            x,
            y,
            width,
            height,
        } = rect;
        let inset = RectF::new(x + 1.0, y + 1.0, width - 2.0, height - 2.0);

        let c = CORNER_SIZE;
        let (right, bottom) = (rect.right(), rect.bottom());
        let corners = [
            [
                PointF::new(x, y + c),
                PointF::new(x, y),
                PointF::new(x + c, y),
            ],
            [
                PointF::new(right - c, y),
                PointF::new(right, y),
                PointF::new(right, y + c),
            ],
            [
                PointF::new(x, bottom - c),
                PointF::new(x, bottom),
                PointF::new(x + c, bottom),
            ],
            [
                PointF::new(right - c, bottom),
                PointF::new(right, bottom),
                PointF::new(right, bottom - c),
            ],
        ];

        let below = y <= LABEL_CLEARANCE;
        let baseline = if below {
            bottom + LABEL_HEIGHT
        } else {
            y - 2.0
        };
        let background = RectF::new(
            x,
            baseline - LABEL_HEIGHT,
            label_text_width + 2.0 * LABEL_PADDING,
            LABEL_HEIGHT,
        );
        let label = Label {
            text: label_text(index),
            background,
            text_origin: PointF::new(x + LABEL_PADDING, baseline - LABEL_HEIGHT / 2.0),
            below,
        };

        Self {
            index,
            rect,
            inset,
            corners,
            label,
        }
    }
}

pub fn label_text(index: usize) -> String {
    format!("Face {index}")
}

/// Lay out markers for `faces`. `None` if the geometry has no usable scale.
pub fn layout(
    faces: &[Face],
    geometry: ImageGeometry,
    measure: impl Fn(&str) -> f32,
) -> Option<Vec<FaceMarker>> {
    let scale = geometry.scale()?;
    Some(
        faces
            .iter()
            .enumerate()
            .map(|(i, face)| {
                let index = i + 1;
                FaceMarker::new(index, scale.apply(face), measure(&label_text(index)))
            })
            .collect(),
    )
}

/// Paint prepared markers. The canvas is not cleared here.
pub fn paint(canvas: &mut dyn Canvas, markers: &[FaceMarker]) {
    let outer = Stroke::dashed(BOX_COLOR, OUTER_WIDTH, OUTER_DASH);
    let inset = Stroke::solid(INSET_COLOR, INSET_WIDTH);
    let corner = Stroke::solid(BOX_COLOR, CORNER_WIDTH);

    for marker in markers {
        canvas.stroke_rect(marker.rect, outer);
        canvas.stroke_rect(marker.inset, inset);
        canvas.fill_rect(marker.label.background, LABEL_BACKGROUND);
        canvas.fill_text(marker.label.text_origin, &marker.label.text, LABEL_TEXT);
        for leg in &marker.corners {
            canvas.stroke_polyline(leg, corner);
        }
    }
}

/// What a call to [`Overlay::render`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn(usize),
    /// Image not decoded yet; kept as the single pending render.
    Deferred,
}

/// Owns the face set currently on the overlay and at most one deferred render.
#[derive(Debug, Default)]
pub struct Overlay {
    shown: Vec<Face>,
    pending: Option<Vec<Face>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear and draw `faces`, or defer until the view knows its geometry.
    pub fn render<V: View + ?Sized>(&mut self, faces: &[Face], view: &mut V) -> RenderOutcome {
        let Some(geometry) = view.image_geometry().filter(|g| g.scale().is_some()) else {
            debug!(faces = faces.len(), "image not decoded yet, deferring overlay");
            self.pending = Some(faces.to_vec());
            return RenderOutcome::Deferred;
        };

        self.pending = None;
        let canvas = view.canvas();
        canvas.resize(geometry.display);
        canvas.clear();
        let markers = layout(faces, geometry, |text| canvas.measure_text(text)).unwrap_or_default();
        paint(canvas, &markers);
        debug!(
            faces = markers.len(),
            display = %geometry.display,
            natural = %geometry.natural,
            "overlay drawn"
        );

        self.shown = faces.to_vec();
        RenderOutcome::Drawn(markers.len())
    }

    /// Run the pending render if there is one, else redraw what is shown.
    /// Called once the display geometry is known or has changed.
    pub fn refresh<V: View + ?Sized>(&mut self, view: &mut V) -> Option<RenderOutcome> {
        let faces = match self.pending.take() {
            Some(pending) => pending,
            None if !self.shown.is_empty() => self.shown.clone(),
            None => return None,
        };
        Some(self.render(&faces, view))
    }

    /// Forget everything and wipe the canvas.
    pub fn clear<V: View + ?Sized>(&mut self, view: &mut V) {
        self.shown.clear();
        self.pending = None;
        view.canvas().clear();
    }
}
