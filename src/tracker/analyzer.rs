use super::extrapolate::Extrapolate;
use crate::config::PoseConfig;
use crate::pose::LandmarkFrame;
use std::collections::VecDeque;

/// 補間スナップショットの信頼度: 0.5 から欠損フレームごとに 0.1 ずつ下げる
const SYNTHETIC_CONFIDENCE_START: f32 = 0.5;
const SYNTHETIC_CONFIDENCE_STEP: f32 = 0.1;

/// 1フレーム分のメトリクス
pub trait MetricSnapshot: Extrapolate {
    fn confidence(&self) -> f32;
    fn set_confidence(&mut self, confidence: f32);
}

/// 種目ごとのメトリクス計算器
///
/// 必須ランドマークが見えていなければ `None` を返す（部分的なスナップショットは作らない）。
pub trait MetricCalculator {
    type Snapshot: MetricSnapshot;

    fn calculate(&mut self, frame: &LandmarkFrame) -> Option<Self::Snapshot>;

    /// 平滑化・フェーズ・レップ状態を初期化する
    fn reset(&mut self);
}

/// フレーム列をメトリクス履歴に変換する
///
/// `max_interpolation_frames > 0` のとき、検出が途切れても上限フレーム数までは
/// 直近の変化量から外挿したスナップショットを履歴に積む。
pub struct PoseAnalyzer<C: MetricCalculator> {
    calculator: C,
    history: VecDeque<C::Snapshot>,
    max_history: usize,
    max_interpolation_frames: u32,
    interpolation_decay: f32,
    frames_since_valid: u32,
}

impl<C: MetricCalculator> PoseAnalyzer<C> {
    /// 補間なし
    pub fn new(calculator: C, max_history: usize) -> Self {
        Self {
            calculator,
            history: VecDeque::with_capacity(max_history),
            max_history: max_history.max(1),
            max_interpolation_frames: 0,
            interpolation_decay: 0.0,
            frames_since_valid: 0,
        }
    }

    pub fn from_config(calculator: C, config: &PoseConfig) -> Self {
        Self::new(calculator, config.max_history)
            .with_interpolation(config.max_interpolation_frames, config.interpolation_decay)
    }

    pub fn with_interpolation(mut self, max_frames: u32, decay: f32) -> Self {
        self.max_interpolation_frames = max_frames;
        self.interpolation_decay = decay;
        self
    }

    /// 1ティック分を処理する。`None` は検出なし
    ///
    /// このティックで履歴に積んだスナップショット（計測または補間）を返す。
    pub fn process_frame(&mut self, frame: Option<&LandmarkFrame>) -> Option<&C::Snapshot> {
        let measured = frame.and_then(|f| self.calculator.calculate(f));
        match measured {
            Some(snapshot) => {
                self.frames_since_valid = 0;
                self.push(snapshot);
                self.history.back()
            }
            None => {
                let filled = if self.frames_since_valid < self.max_interpolation_frames {
                    self.interpolate()
                } else {
                    None
                };
                self.frames_since_valid = self.frames_since_valid.saturating_add(1);
                match filled {
                    Some(snapshot) => {
                        self.push(snapshot);
                        self.history.back()
                    }
                    None => None,
                }
            }
        }
    }

    fn push(&mut self, snapshot: C::Snapshot) {
        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(snapshot);
    }

    fn interpolate(&self) -> Option<C::Snapshot> {
        let last = self.history.back()?;
        let mut next = match self.history.len() {
            1 => last.clone(),
            n => last.extrapolate(&self.history[n - 2], self.interpolation_decay),
        };
        let confidence = SYNTHETIC_CONFIDENCE_START
            - SYNTHETIC_CONFIDENCE_STEP * self.frames_since_valid as f32;
        next.set_confidence(confidence.max(0.0));
        Some(next)
    }

    /// 最新スナップショット
    pub fn latest(&self) -> Option<&C::Snapshot> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &C::Snapshot> {
        self.history.iter()
    }

    pub fn frames_since_valid(&self) -> u32 {
        self.frames_since_valid
    }

    pub fn is_interpolating(&self) -> bool {
        self.frames_since_valid > 0
    }

    /// 直近 `frames` 件の平均信頼度
    pub fn average_confidence(&self, frames: usize) -> f32 {
        let n = frames.min(self.history.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.history.iter().rev().take(n).map(|s| s.confidence()).sum();
        sum / n as f32
    }

    /// 直近 `frames` 件すべてに値があり、その変動幅が `threshold` 以下か
    pub fn is_metric_stable<F>(&self, selector: F, threshold: f32, frames: usize) -> bool
    where
        F: Fn(&C::Snapshot) -> Option<f32>,
    {
        if frames == 0 || self.history.len() < frames {
            return false;
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for snapshot in self.history.iter().rev().take(frames) {
            match selector(snapshot) {
                Some(v) => {
                    min = min.min(v);
                    max = max.max(v);
                }
                None => return false,
            }
        }
        max - min <= threshold
    }

    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    pub fn calculator_mut(&mut self) -> &mut C {
        &mut self.calculator
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.frames_since_valid = 0;
        self.calculator.reset();
    }
}
