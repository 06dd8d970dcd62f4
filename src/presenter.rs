//! The results panel state machine and the text it puts on screen.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::types::{DetectionResult, Face};

pub const NO_FACES: &str = "No faces detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewState {
    Empty,
    Preview,
    Loading,
    Results,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewState::Empty => "EMPTY",
            ViewState::Preview => "PREVIEW",
            ViewState::Loading => "LOADING",
            ViewState::Results => "RESULTS",
        };
        f.write_str(name)
    }
}

/// The single-value text fields of the results panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Readout {
    FaceCount,
    ProcessingTime,
    ImageSize,
    FileSize,
    MinSize,
    ScaleFactor,
    MinNeighbors,
}

impl Readout {
    pub fn label(self) -> &'static str {
        match self {
            Readout::FaceCount => "Faces",
            Readout::ProcessingTime => "Processing time",
            Readout::ImageSize => "Image size",
            Readout::FileSize => "File size",
            Readout::MinSize => "Min size",
            Readout::ScaleFactor => "Scale factor",
            Readout::MinNeighbors => "Min neighbors",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TableRow {
    Face {
        index: usize,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        area: u64,
    },
    Placeholder,
}

impl TableRow {
    pub const HEADERS: [&'static str; 6] = ["#", "X", "Y", "Width", "Height", "Area"];

    pub fn face(index: usize, face: &Face) -> Self {
        TableRow::Face {
            index,
            x: face.x,
            y: face.y,
            width: face.width,
            height: face.height,
            area: face.area(),
        }
    }

    /// Cell texts in column order. A placeholder is one cell spanning the table.
    pub fn cells(&self) -> Vec<String> {
        match self {
            TableRow::Face {
                index,
                x,
                y,
                width,
                height,
                area,
            } => vec![
                index.to_string(),
                x.to_string(),
                y.to_string(),
                width.to_string(),
                height.to_string(),
                format_area(*area),
            ],
            TableRow::Placeholder => vec![NO_FACES.to_string()],
        }
    }
}

/// `2500` → `"2,500 px²"`.
pub fn format_area(area: u64) -> String {
    format!("{} px²", group_thousands(area))
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_millis())
}

/// Everything the results panel should show after one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub state: ViewState,
    pub face_count: String,
    pub processing_time: String,
    pub rows: Vec<TableRow>,
}

impl Frame {
    fn cleared(state: ViewState) -> Self {
        Self {
            state,
            face_count: "0".to_string(),
            processing_time: "-".to_string(),
            rows: Vec::new(),
        }
    }
}

/// Tracks the results panel state. Transitions that do not apply to the
/// current state return `None` and change nothing.
#[derive(Debug, Clone)]
pub struct Presenter {
    state: ViewState,
}

impl Default for Presenter {
    fn default() -> Self {
        Self {
            state: ViewState::Empty,
        }
    }
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// A new asset was accepted. Valid from every state.
    pub fn asset_loaded(&mut self) -> Frame {
        self.goto(ViewState::Preview);
        Frame::cleared(ViewState::Preview)
    }

    pub fn detection_started(&mut self) -> Option<ViewState> {
        match self.state {
            ViewState::Preview | ViewState::Results => {
                self.goto(ViewState::Loading);
                Some(self.state)
            }
            ViewState::Empty | ViewState::Loading => None,
        }
    }

    pub fn succeeded(&mut self, result: &DetectionResult, elapsed: Duration) -> Option<Frame> {
        if self.state != ViewState::Loading {
            return None;
        }
        self.goto(ViewState::Results);

        let rows = if result.faces.is_empty() {
            vec![TableRow::Placeholder]
        } else {
            result
                .faces
                .iter()
                .enumerate()
                .map(|(i, face)| TableRow::face(i + 1, face))
                .collect()
        };
        Some(Frame {
            state: ViewState::Results,
            face_count: result.face_count.to_string(),
            processing_time: format_elapsed(elapsed),
            rows,
        })
    }

    pub fn failed(&mut self) -> Option<Frame> {
        if self.state != ViewState::Loading {
            return None;
        }
        self.goto(ViewState::Preview);
        Some(Frame::cleared(ViewState::Preview))
    }

    fn goto(&mut self, next: ViewState) {
        debug!(from = %self.state, to = %next, "results panel");
        self.state = next;
    }
}
