//! The display seam the session drives, and an in-memory implementation of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbaImage;

use crate::client::ApiStatus;
use crate::notifier::Notification;
use crate::overlay::{Canvas, ImageGeometry};
use crate::presenter::{Readout, TableRow, ViewState};
use crate::raster::{composite, RasterCanvas};
use crate::types::{ImageAsset, Size};

/// How many notifications [`RetainedView`] keeps; older ones are dropped.
pub const NOTIFICATION_HISTORY: usize = 32;

/// A display surface: preview image, results panel, controls and an overlay canvas.
pub trait View {
    /// Put `asset` on screen. The displayed size is unknown until the host
    /// reports it, so [`View::image_geometry`] may return `None` afterwards.
    fn show_image(&mut self, asset: &ImageAsset);

    /// Natural and displayed size of the current image, once both are known.
    fn image_geometry(&self) -> Option<ImageGeometry>;

    /// The host learned (or changed) the size the image is displayed at.
    fn set_display_size(&mut self, size: Size);

    fn show_state(&mut self, state: ViewState);

    fn set_readout(&mut self, readout: Readout, text: String);

    fn clear_table(&mut self);

    fn append_row(&mut self, row: TableRow);

    /// `busy` switches the button to its spinner label.
    fn set_detect_enabled(&mut self, enabled: bool, busy: bool);

    fn set_api_status(&mut self, status: &ApiStatus);

    fn notify(&mut self, notification: &Notification);

    fn canvas(&mut self) -> &mut dyn Canvas;
}

/// Keeps whatever it was told to show. The CLI and tests read it back; the GUI
/// renders it every frame.
#[derive(Debug)]
pub struct RetainedView {
    image: Option<Arc<RgbaImage>>,
    display: Option<Size>,
    state: ViewState,
    readouts: BTreeMap<Readout, String>,
    rows: Vec<TableRow>,
    detect_enabled: bool,
    busy: bool,
    api_status: ApiStatus,
    notifications: Vec<Notification>,
    canvas: RasterCanvas,
}

impl Default for RetainedView {
    fn default() -> Self {
        Self {
            image: None,
            display: None,
            state: ViewState::Empty,
            readouts: BTreeMap::new(),
            rows: Vec::new(),
            detect_enabled: false,
            busy: false,
            api_status: ApiStatus::Unknown,
            notifications: Vec::new(),
            canvas: RasterCanvas::default(),
        }
    }
}

impl RetainedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    pub fn display_size(&self) -> Option<Size> {
        self.display
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn readout(&self, readout: Readout) -> Option<&str> {
        self.readouts.get(&readout).map(String::as_str)
    }

    pub fn readouts(&self) -> impl Iterator<Item = (Readout, &str)> {
        self.readouts.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn detect_enabled(&self) -> bool {
        self.detect_enabled
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn api_status(&self) -> &ApiStatus {
        &self.api_status
    }

    /// The last [`NOTIFICATION_HISTORY`] notifications forwarded, oldest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn overlay(&self) -> &RasterCanvas {
        &self.canvas
    }

    /// The preview scaled to the display size with the overlay on top.
    pub fn composite(&self) -> Option<RgbaImage> {
        let image = self.image.as_ref()?;
        if !self.canvas.size().is_empty() {
            return Some(composite(image, self.canvas.image()));
        }
        match self.display.filter(|size| !size.is_empty()) {
            Some(size) => Some(composite(image, &RgbaImage::new(size.width, size.height))),
            None => Some(image.as_ref().clone()),
        }
    }
}

impl View for RetainedView {
    fn show_image(&mut self, asset: &ImageAsset) {
        self.image = Some(Arc::clone(&asset.preview));
        self.display = None;
        self.canvas.resize(Size::new(0, 0));
    }

    fn image_geometry(&self) -> Option<ImageGeometry> {
        let image = self.image.as_ref()?;
        let display = self.display?;
        let (width, height) = image.dimensions();
        Some(ImageGeometry {
            natural: Size::new(width, height),
            display,
        })
    }

    fn set_display_size(&mut self, size: Size) {
        self.display = Some(size);
    }

    fn show_state(&mut self, state: ViewState) {
        self.state = state;
    }

    fn set_readout(&mut self, readout: Readout, text: String) {
        self.readouts.insert(readout, text);
    }

    fn clear_table(&mut self) {
        self.rows.clear();
    }

    fn append_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    fn set_detect_enabled(&mut self, enabled: bool, busy: bool) {
        self.detect_enabled = enabled;
        self.busy = busy;
    }

    fn set_api_status(&mut self, status: &ApiStatus) {
        self.api_status = status.clone();
    }

    fn notify(&mut self, notification: &Notification) {
        if self.notifications.len() == NOTIFICATION_HISTORY {
            self.notifications.remove(0);
        }
        self.notifications.push(notification.clone());
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{Level, Notifier};
    use crate::overlay::{RectF, BOX_COLOR};

    fn asset(width: u32, height: u32) -> ImageAsset {
        ImageAsset {
            name: "a.png".to_string(),
            raw_bytes: Arc::from(Vec::new()),
            mime_type: "image/png".to_string(),
            natural_width: width,
            natural_height: height,
            byte_size: 0,
            preview: Arc::new(RgbaImage::new(width, height)),
        }
    }

    #[test]
    fn geometry_waits_for_display_size() {
        let mut view = RetainedView::new();
        assert!(view.image_geometry().is_none());

        view.show_image(&asset(64, 32));
        assert!(view.image_geometry().is_none());

        view.set_display_size(Size::new(128, 16));
        let geometry = view.image_geometry().unwrap();
        assert_eq!(geometry.natural, Size::new(64, 32));
        assert_eq!(geometry.display, Size::new(128, 16));

        view.show_image(&asset(10, 10));
        assert!(view.image_geometry().is_none());
    }

    #[test]
    fn notification_history_is_bounded() {
        let mut view = RetainedView::new();
        let mut notifier = Notifier::default();
        for i in 0..NOTIFICATION_HISTORY + 5 {
            let notification = notifier.notify(Level::Info, format!("toast {i}"));
            view.notify(&notification);
        }

        let kept = view.notifications();
        assert_eq!(kept.len(), NOTIFICATION_HISTORY);
        assert_eq!(kept[0].message, "toast 5");
        assert_eq!(
            kept.last().unwrap().message,
            format!("toast {}", NOTIFICATION_HISTORY + 4)
        );
    }

    #[test]
    fn composite_follows_display_size() {
        let mut view = RetainedView::new();
        assert!(view.composite().is_none());

        view.show_image(&asset(64, 32));
        assert_eq!(view.composite().unwrap().dimensions(), (64, 32));

        view.set_display_size(Size::new(32, 16));
        assert_eq!(view.composite().unwrap().dimensions(), (32, 16));

        let canvas = view.canvas();
        canvas.resize(Size::new(32, 16));
        canvas.clear();
        canvas.fill_rect(RectF::new(0.0, 0.0, 2.0, 2.0), BOX_COLOR);
        assert_eq!(view.composite().unwrap().get_pixel(0, 0), &BOX_COLOR);
    }
}
