/// Core session logic
///
/// Contains the learning session that turns a capture device's output
/// into wire codes.

pub mod learner;

pub use learner::{CaptureDevice, Learner, LearningEvent, LearningOutcome, LearningState};
