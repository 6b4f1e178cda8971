use crate::config::SmootherConfig;

/// 速度適応型のスカラー平滑化フィルタ
///
/// 速い動きでは追従性を、静止付近では安定性を優先してブレンド係数を切り替える。
/// 1インスタンスは1つの追跡値（例: 正面カメラの右肘角度）専用。
#[derive(Debug, Clone)]
pub struct AdaptiveSmoother {
    config: SmootherConfig,
    prev: Option<f32>,
    velocity: f32,
}

impl AdaptiveSmoother {
    pub fn new(base_smoothing: f32, velocity_threshold: f32) -> Self {
        Self::from_config(&SmootherConfig::new(base_smoothing, velocity_threshold))
    }

    pub fn from_config(config: &SmootherConfig) -> Self {
        Self {
            config: *config,
            prev: None,
            velocity: 0.0,
        }
    }

    /// 入力を1つ取り込み平滑化済みの値を返す
    pub fn update(&mut self, value: f32) -> f32 {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(value);
                return value;
            }
        };

        let instant = (value - prev).abs();
        let vs = self.config.velocity_smoothing;
        self.velocity = vs * instant + (1.0 - vs) * self.velocity;

        let factor = self.blend_factor();
        let result = prev + factor * (value - prev);
        self.prev = Some(result);
        result
    }

    fn blend_factor(&self) -> f32 {
        let c = &self.config;
        if c.velocity_threshold <= 0.0 {
            return c.max_factor;
        }
        let ratio = self.velocity / c.velocity_threshold;
        if ratio > 1.0 {
            (c.base_smoothing * ratio.min(2.0)).min(c.max_factor)
        } else {
            (c.base_smoothing * (0.5 + 0.5 * ratio)).max(c.min_factor)
        }
    }

    /// 平滑化された速度（1更新あたりの変化量）
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn value(&self) -> Option<f32> {
        self.prev
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.velocity = 0.0;
    }
}
