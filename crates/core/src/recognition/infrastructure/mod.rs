pub mod json_identity_store;
pub mod onnx_face_encoder;
