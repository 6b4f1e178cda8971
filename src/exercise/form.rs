use crate::config::FormConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// レップ却下の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    TrunkTilted,
    ArmNotVertical,
    ElbowDrifting,
    BothArmsFlexed,
    ConsecutiveSameSide,
    ArmsNotSynchronized,
    ElbowsTooWide,
    IncompleteLockout,
}

impl ErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            Self::TrunkTilted => "Keep your back straight",
            Self::ArmNotVertical => "Keep your upper arm vertical",
            Self::ElbowDrifting => "Keep your elbow pinned to your side",
            Self::BothArmsFlexed => "Don't curl both arms at once",
            Self::ConsecutiveSameSide => "Alternate your arms",
            Self::ArmsNotSynchronized => "Press both arms evenly",
            Self::ElbowsTooWide => "Keep your elbows forward",
            Self::IncompleteLockout => "Fully straighten your arms at the top",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Trunk,
    LeftArm,
    RightArm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub fn arm(self) -> BodyPart {
        match self {
            Self::Right => BodyPart::RightArm,
            Self::Left => BodyPart::LeftArm,
        }
    }
}

/// 1レップの判定結果
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub error: Option<ErrorCode>,
    pub affected_parts: Vec<BodyPart>,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            error: None,
            affected_parts: Vec::new(),
        }
    }

    pub fn reject(code: ErrorCode, parts: &[BodyPart]) -> Self {
        Self {
            error: Some(code),
            affected_parts: parts.to_vec(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

const BOTH_ARMS: [BodyPart; 2] = [BodyPart::LeftArm, BodyPart::RightArm];

pub fn both_arms() -> &'static [BodyPart] {
    &BOTH_ARMS
}

/// 1ティック分の出力
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepOutcome {
    pub right_reps: u32,
    pub left_reps: u32,
    pub rep_detected: bool,
    pub valid: bool,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub affected_parts: Vec<BodyPart>,
    pub waiting_for_neutral: bool,
    pub feedback: FormFeedback,
}

impl RepOutcome {
    /// レップ検出なし
    pub fn idle(right_reps: u32, left_reps: u32) -> Self {
        Self {
            right_reps,
            left_reps,
            rep_detected: false,
            valid: false,
            error_code: None,
            error_message: None,
            affected_parts: Vec::new(),
            waiting_for_neutral: false,
            feedback: FormFeedback::default(),
        }
    }

    /// 判定済みレップ
    pub fn judged(right_reps: u32, left_reps: u32, verdict: Verdict) -> Self {
        Self {
            rep_detected: true,
            valid: verdict.is_valid(),
            error_code: verdict.error,
            error_message: verdict.error.map(|e| e.message().to_string()),
            affected_parts: verdict.affected_parts,
            ..Self::idle(right_reps, left_reps)
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rep_detected && !self.valid
    }
}

// --- リアルタイムフォーム監視 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormWarning {
    TrunkLean,
    ElbowFlare,
    UncontrolledMovement,
}

impl FormWarning {
    pub fn message(self) -> &'static str {
        match self {
            Self::TrunkLean => "Leaning with the torso",
            Self::ElbowFlare => "Elbows drifting away from the body",
            Self::UncontrolledMovement => "Uncontrolled movement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Low,
    High,
}

/// ライブ表示用。レップの採否には使わない
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFeedback {
    pub warnings: Vec<FormWarning>,
    pub severity: Severity,
}

/// 1フレーム分の観測。`None` はそのビューが無かった
#[derive(Debug, Clone, Copy, Default)]
pub struct FormSample {
    pub trunk_lean: Option<bool>,
    pub elbow_flare: Option<bool>,
    pub uncontrolled: Option<bool>,
}

#[derive(Debug, Clone)]
struct RollingFlags {
    flags: VecDeque<bool>,
    window: usize,
    trigger: usize,
}

impl RollingFlags {
    fn new(window: usize, trigger: usize) -> Self {
        Self {
            flags: VecDeque::with_capacity(window),
            window: window.max(1),
            trigger: trigger.max(1),
        }
    }

    fn push(&mut self, flag: bool) {
        if self.flags.len() >= self.window {
            self.flags.pop_front();
        }
        self.flags.push_back(flag);
    }

    fn active(&self) -> bool {
        self.flags.iter().filter(|&&f| f).count() >= self.trigger
    }

    fn clear(&mut self) {
        self.flags.clear();
    }
}

/// 直近ウィンドウ内で一定回数以上検出された姿勢崩れを警告する
#[derive(Debug, Clone)]
pub struct FormMonitor {
    trunk: RollingFlags,
    elbow: RollingFlags,
    velocity: RollingFlags,
}

impl FormMonitor {
    pub fn from_config(config: &FormConfig) -> Self {
        Self {
            trunk: RollingFlags::new(config.window, config.trigger),
            elbow: RollingFlags::new(config.window, config.trigger),
            velocity: RollingFlags::new(config.velocity_window, config.velocity_trigger),
        }
    }

    pub fn observe(&mut self, sample: FormSample) -> FormFeedback {
        if let Some(f) = sample.trunk_lean {
            self.trunk.push(f);
        }
        if let Some(f) = sample.elbow_flare {
            self.elbow.push(f);
        }
        if let Some(f) = sample.uncontrolled {
            self.velocity.push(f);
        }
        self.feedback()
    }

    pub fn feedback(&self) -> FormFeedback {
        let warnings: Vec<FormWarning> = [
            (FormWarning::TrunkLean, &self.trunk),
            (FormWarning::ElbowFlare, &self.elbow),
            (FormWarning::UncontrolledMovement, &self.velocity),
        ]
        .into_iter()
        .filter(|(_, flags)| flags.active())
        .map(|(w, _)| w)
        .collect();
        let severity = match warnings.len() {
            0 => Severity::None,
            1 => Severity::Low,
            _ => Severity::High,
        };
        FormFeedback { warnings, severity }
    }

    pub fn reset(&mut self) {
        self.trunk.clear();
        self.elbow.clear();
        self.velocity.clear();
    }
}
