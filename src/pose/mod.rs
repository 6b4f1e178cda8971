pub mod geometry;
pub mod keypoint;
pub mod recording;

pub use keypoint::{Landmark, LandmarkFrame, LandmarkId};
pub use recording::{load_recording, RecordedTick};
