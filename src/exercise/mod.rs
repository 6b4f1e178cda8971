pub mod curl;
pub mod form;
pub mod press;

pub use curl::{CurlController, CurlValidator};
pub use form::{BodyPart, ErrorCode, FormFeedback, FormMonitor, RepOutcome, Severity, Side, Verdict};
pub use press::{PressController, PressValidator};

use crate::calibration::CalibrationData;
use crate::config::Config;
use crate::pose::LandmarkFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 種目の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    BicepCurl,
    OverheadPress,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 2] = [ExerciseKind::BicepCurl, ExerciseKind::OverheadPress];

    /// 音声・表示用の名前
    pub fn display_name(self) -> &'static str {
        match self {
            Self::BicepCurl => "Alternating bicep curl",
            Self::OverheadPress => "Overhead press",
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::BicepCurl => "bicep_curl",
            Self::OverheadPress => "overhead_press",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// 種目ごとの解析器。種目に入るたびに新しく作る
pub enum ExerciseController {
    Curl(CurlController),
    Press(PressController),
}

impl ExerciseController {
    pub fn new(kind: ExerciseKind, config: &Config, calibration: &CalibrationData) -> Self {
        match kind {
            ExerciseKind::BicepCurl => Self::Curl(CurlController::new(config, calibration)),
            ExerciseKind::OverheadPress => Self::Press(PressController::new(config, calibration)),
        }
    }

    pub fn kind(&self) -> ExerciseKind {
        match self {
            Self::Curl(_) => ExerciseKind::BicepCurl,
            Self::Press(_) => ExerciseKind::OverheadPress,
        }
    }

    pub fn process_frames(
        &mut self,
        front: Option<&LandmarkFrame>,
        profile: Option<&LandmarkFrame>,
    ) -> RepOutcome {
        match self {
            Self::Curl(c) => c.process_frames(front, profile),
            Self::Press(c) => c.process_frames(front, profile),
        }
    }

    pub fn right_reps(&self) -> u32 {
        match self {
            Self::Curl(c) => c.right_reps(),
            Self::Press(c) => c.right_reps(),
        }
    }

    pub fn left_reps(&self) -> u32 {
        match self {
            Self::Curl(c) => c.left_reps(),
            Self::Press(c) => c.left_reps(),
        }
    }
}
