mod model_input;
pub mod onnx_hand_landmarker;
pub mod onnx_palm_detector;
