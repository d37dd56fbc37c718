pub mod associator;
pub mod hand_gesture_detector;
pub mod hand_landmark_detector;
pub mod hand_landmarks;
