use crate::config::PhaseConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const MAX_TRANSITION_HISTORY: usize = 10;

/// 関節の可動域上の位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unknown,
    Flexed,
    Middle,
    Extended,
}

/// 確定したフェーズ遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    /// 遷移前のフェーズに留まっていたフレーム数
    pub frames_in_previous: u32,
}

/// ヒステリシス付きフェーズ検出器
///
/// 判定は2つの閾値で行い、確定フェーズから抜けるときだけ `hysteresis` の余裕を要求する。
/// 判定結果が `stability_frames` 回連続で一致したときにのみフェーズを確定させる。
#[derive(Debug, Clone)]
pub struct PhaseDetector {
    config: PhaseConfig,
    phase: Phase,
    frames_in_phase: u32,
    candidate: Option<Phase>,
    candidate_frames: u32,
    history: VecDeque<PhaseTransition>,
}

impl PhaseDetector {
    pub fn new(flex_threshold: f32, extend_threshold: f32) -> Self {
        Self::from_config(&PhaseConfig::new(flex_threshold, extend_threshold))
    }

    pub fn from_config(config: &PhaseConfig) -> Self {
        Self {
            config: *config,
            phase: Phase::Unknown,
            frames_in_phase: 0,
            candidate: None,
            candidate_frames: 0,
            history: VecDeque::with_capacity(MAX_TRANSITION_HISTORY),
        }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    fn classify(&self, angle: f32) -> Phase {
        let c = &self.config;
        let plain = if angle <= c.flex_threshold {
            Phase::Flexed
        } else if angle >= c.extend_threshold {
            Phase::Extended
        } else {
            Phase::Middle
        };
        match self.phase {
            Phase::Flexed if angle < c.flex_threshold + c.hysteresis => Phase::Flexed,
            Phase::Extended if angle > c.extend_threshold - c.hysteresis => Phase::Extended,
            _ => plain,
        }
    }

    /// 平滑化済み角度を1つ取り込む。フェーズが確定した時だけ遷移を返す
    pub fn update(&mut self, angle: f32) -> Option<PhaseTransition> {
        let detected = self.classify(angle);
        self.frames_in_phase = self.frames_in_phase.saturating_add(1);

        if detected == self.phase {
            self.candidate = None;
            self.candidate_frames = 0;
            return None;
        }

        if self.candidate == Some(detected) {
            self.candidate_frames += 1;
        } else {
            self.candidate = Some(detected);
            self.candidate_frames = 1;
        }

        if self.candidate_frames < self.config.stability_frames.max(1) {
            return None;
        }

        let transition = PhaseTransition {
            from: self.phase,
            to: detected,
            frames_in_previous: self.frames_in_phase - self.candidate_frames,
        };
        tracing::debug!(
            "phase {:?} -> {:?} (angle {:.1}, {} frames)",
            transition.from,
            transition.to,
            angle,
            transition.frames_in_previous
        );
        self.phase = detected;
        self.frames_in_phase = self.candidate_frames;
        self.candidate = None;
        self.candidate_frames = 0;
        if self.history.len() == MAX_TRANSITION_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(transition);
        Some(transition)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frames_in_phase(&self) -> u32 {
        self.frames_in_phase
    }

    /// 直近 `frames` フレームの間、確定フェーズが変わっていないか
    pub fn is_stable(&self, frames: u32) -> bool {
        self.phase != Phase::Unknown && self.frames_in_phase >= frames
    }

    /// 古い順の遷移履歴
    pub fn history(&self) -> impl Iterator<Item = &PhaseTransition> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Unknown;
        self.frames_in_phase = 0;
        self.candidate = None;
        self.candidate_frames = 0;
        self.history.clear();
    }
}
