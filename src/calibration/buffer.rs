use crate::config::CalibrationConfig;
use std::collections::VecDeque;

/// 外れ値に強い測定バッファ
///
/// 容量いっぱいまで溜まったら平均±sigma×標準偏差の外側を捨て、
/// 半数以上が残り、かつ残りの標準偏差が上限未満なら平均値を採用する。
/// 採用できなければ新しい側の半分だけ残して測定を続ける。
#[derive(Debug, Clone)]
pub struct MeasurementBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    outlier_sigma: f32,
    max_std_dev: f32,
}

fn mean_std(values: &[f32]) -> (f32, f32) {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    (mean, var.sqrt())
}

impl MeasurementBuffer {
    pub fn new(capacity: usize, outlier_sigma: f32, max_std_dev: f32) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            outlier_sigma,
            max_std_dev,
        }
    }

    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::new(config.window_size, config.outlier_sigma, config.max_std_dev)
    }

    /// サンプルを追加する。測定値が確定したら `Some(平均)` を返しバッファを空にする
    pub fn push(&mut self, value: f32) -> Option<f32> {
        if !value.is_finite() {
            return None;
        }
        self.samples.push_back(value);
        if self.samples.len() < self.capacity {
            return None;
        }

        let all: Vec<f32> = self.samples.iter().copied().collect();
        let (mean, std) = mean_std(&all);
        let kept: Vec<f32> = if std == 0.0 {
            all
        } else {
            let limit = self.outlier_sigma * std;
            all.into_iter().filter(|v| (v - mean).abs() <= limit).collect()
        };

        if !kept.is_empty() && kept.len() * 2 >= self.capacity {
            let (filtered_mean, filtered_std) = mean_std(&kept);
            if filtered_std < self.max_std_dev {
                self.samples.clear();
                return Some(filtered_mean);
            }
        }

        let keep = self.capacity / 2;
        while self.samples.len() > keep {
            self.samples.pop_front();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
