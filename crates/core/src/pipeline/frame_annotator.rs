use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// How far along the attendance path a face is, which decides its colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceState {
    Unknown,
    /// Recognised, dwell time not yet reached.
    Seen,
    Confirmed,
    /// Attendance already recorded today.
    Attended,
}

impl FaceState {
    pub fn color(&self) -> [u8; 3] {
        match self {
            FaceState::Unknown => [255, 0, 0],
            FaceState::Seen => [255, 128, 0],
            FaceState::Confirmed => [0, 255, 255],
            FaceState::Attended => [0, 255, 0],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedFace {
    pub face_box: FaceBox,
    pub state: FaceState,
    /// Display confidence in [0, 1].
    pub confidence: f64,
}

/// What the latest detection cycle wants drawn on every frame until the
/// next cycle replaces it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    pub faces: Vec<AnnotatedFace>,
    pub raised_hands: Vec<(i32, i32)>,
}

const BOX_THICKNESS: i32 = 2;
const LABEL_HEIGHT: i32 = 12;
const HAND_RADIUS: i32 = 15;
const HAND_COLOR: [u8; 3] = [255, 255, 0];
const LABEL_TRACK: [u8; 3] = [40, 40, 40];

/// Draws an [`Overlay`] onto RGB frames.
///
/// Each face gets an outline in its state colour and a label strip along
/// the bottom edge; recognised faces fill the strip in proportion to their
/// match confidence. Raised hands get a ring around their center.
#[derive(Clone, Debug, Default)]
pub struct FrameAnnotator;

impl FrameAnnotator {
    pub fn new() -> Self {
        Self
    }

    pub fn annotate(&self, frame: &mut Frame, overlay: &Overlay) {
        for face in &overlay.faces {
            draw_face(frame, face);
        }
        for &center in &overlay.raised_hands {
            draw_ring(frame, center, HAND_RADIUS, BOX_THICKNESS, HAND_COLOR);
        }
    }
}

fn draw_face(frame: &mut Frame, face: &AnnotatedFace) {
    let b = face.face_box;
    let color = face.state.color();
    draw_outline(frame, &b, BOX_THICKNESS, color);

    let strip_top = (b.bottom - LABEL_HEIGHT).max(b.top);
    if face.state == FaceState::Unknown {
        fill_rect(frame, b.left, strip_top, b.right, b.bottom, color);
        return;
    }
    let filled = b.left + (b.width() as f64 * face.confidence.clamp(0.0, 1.0)).round() as i32;
    fill_rect(frame, b.left, strip_top, filled, b.bottom, color);
    fill_rect(frame, filled, strip_top, b.right, b.bottom, LABEL_TRACK);
}

fn draw_outline(frame: &mut Frame, b: &FaceBox, thickness: i32, color: [u8; 3]) {
    fill_rect(frame, b.left, b.top, b.right, b.top + thickness, color);
    fill_rect(frame, b.left, b.bottom - thickness, b.right, b.bottom, color);
    fill_rect(frame, b.left, b.top, b.left + thickness, b.bottom, color);
    fill_rect(frame, b.right - thickness, b.top, b.right, b.bottom, color);
}

/// Fills `[x0, x1) × [y0, y1)`, clipped to the frame.
fn fill_rect(frame: &mut Frame, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(frame.width() as i32);
    let y1 = y1.min(frame.height() as i32);
    for y in y0..y1 {
        for x in x0..x1 {
            frame.put_pixel(x, y, color);
        }
    }
}

fn draw_ring(frame: &mut Frame, center: (i32, i32), radius: i32, thickness: i32, color: [u8; 3]) {
    let outer = radius * radius;
    let inner = (radius - thickness).max(0).pow(2);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 <= outer && d2 > inner {
                frame.put_pixel(center.0 + dx, center.1 + dy, color);
            }
        }
    }
}
