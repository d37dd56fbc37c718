pub mod detection_cycle;
pub mod detection_logger;
pub mod detection_loop;
pub mod frame_annotator;
pub mod orchestrator;
pub mod status;
