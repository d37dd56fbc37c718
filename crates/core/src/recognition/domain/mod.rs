pub mod encoding;
pub mod face_encoder;
pub mod face_matcher;
pub mod face_recognizer;
pub mod identity_store;
pub mod known_face_set;
