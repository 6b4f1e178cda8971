/// 検出が途切れたフレームを直近の変化量から外挿する
///
/// `self` を最新、`prev` をその1つ前のスナップショットとして次フレームを推定する。
/// 連続値だけを外挿し、フェーズやカウントなどの離散値はそのまま引き継ぐ。
pub trait Extrapolate: Clone {
    fn extrapolate(&self, prev: &Self, decay: f32) -> Self;
}

/// last + (last - prev) × decay
pub fn linear(last: f32, prev: f32, decay: f32) -> f32 {
    last + (last - prev) * decay
}

/// どちらかが欠けていれば最新値をそのまま使う
pub fn linear_opt(last: Option<f32>, prev: Option<f32>, decay: f32) -> Option<f32> {
    match (last, prev) {
        (Some(l), Some(p)) => Some(linear(l, p, decay)),
        (l, _) => l,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_direction() {
        let eps = 1e-5;
        assert!((linear(100.0, 90.0, 0.3) - 103.0).abs() < eps);
        assert!((linear(90.0, 100.0, 0.3) - 87.0).abs() < eps);
        assert!((linear(5.0, 5.0, 0.3) - 5.0).abs() < eps);
    }

    #[test]
    fn test_linear_opt_missing_values() {
        assert_eq!(linear_opt(None, Some(1.0), 0.3), None);
        assert_eq!(linear_opt(Some(2.0), None, 0.3), Some(2.0));
        let v = linear_opt(Some(2.0), Some(1.0), 0.5).unwrap();
        assert!((v - 2.5).abs() < 1e-6);
    }
}
