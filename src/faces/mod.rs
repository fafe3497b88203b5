pub mod crop;
pub mod detector;

pub use crop::{review_defaults, suggest_crop};
pub use detector::{detect_with_timeout, DetectionOutcome, FaceBox, FaceDetector, UltraFaceDetector};
