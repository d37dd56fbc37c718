use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// A face located in a frame together with its identity embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedFace {
    pub face_box: FaceBox,
    pub encoding: Vec<f64>,
}

/// Domain interface for locating faces and computing their embeddings.
///
/// Model internals are opaque to the pipeline. A frame without faces is an
/// empty `Vec`, not an error. Implementations may keep inference sessions,
/// hence `&mut self`.
pub trait FaceEncoder: Send {
    fn encode_faces(&mut self, frame: &Frame)
        -> Result<Vec<EncodedFace>, Box<dyn std::error::Error>>;
}
