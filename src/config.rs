use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub curl: CurlConfig,
    #[serde(default)]
    pub press: PressConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければデフォルト値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}

// --- 平滑化 ---

/// AdaptiveSmoother のパラメータ
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SmootherConfig {
    /// 基本ブレンド係数
    pub base_smoothing: f32,
    /// この速度（1フレームあたりの変化量）を超えると応答性を優先する
    pub velocity_threshold: f32,
    /// 速度推定用EMAの係数
    #[serde(default = "default_velocity_smoothing")]
    pub velocity_smoothing: f32,
    /// ブレンド係数の下限（静止時）
    #[serde(default = "default_min_factor")]
    pub min_factor: f32,
    /// ブレンド係数の上限（高速時）
    #[serde(default = "default_max_factor")]
    pub max_factor: f32,
}

fn default_velocity_smoothing() -> f32 { 0.3 }
fn default_min_factor() -> f32 { 0.1 }
fn default_max_factor() -> f32 { 0.6 }

impl SmootherConfig {
    pub fn new(base_smoothing: f32, velocity_threshold: f32) -> Self {
        Self {
            base_smoothing,
            velocity_threshold,
            velocity_smoothing: default_velocity_smoothing(),
            min_factor: default_min_factor(),
            max_factor: default_max_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmoothingConfig {
    /// 肘角度（度）
    #[serde(default = "default_angle_smoother")]
    pub angle: SmootherConfig,
    /// 肘-体幹距離（肩幅で正規化）
    #[serde(default = "default_elbow_distance_smoother")]
    pub elbow_distance: SmootherConfig,
    /// 手首-肩距離（画像座標）
    #[serde(default = "default_wrist_distance_smoother")]
    pub wrist_distance: SmootherConfig,
    /// 体幹角度（度）
    #[serde(default = "default_trunk_smoother")]
    pub trunk: SmootherConfig,
}

fn default_angle_smoother() -> SmootherConfig { SmootherConfig::new(0.3, 8.0) }
fn default_elbow_distance_smoother() -> SmootherConfig { SmootherConfig::new(0.4, 0.05) }
fn default_wrist_distance_smoother() -> SmootherConfig { SmootherConfig::new(0.35, 0.03) }
fn default_trunk_smoother() -> SmootherConfig { SmootherConfig::new(0.4, 3.0) }

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            angle: default_angle_smoother(),
            elbow_distance: default_elbow_distance_smoother(),
            wrist_distance: default_wrist_distance_smoother(),
            trunk: default_trunk_smoother(),
        }
    }
}

// --- ポーズ解析 ---

#[derive(Debug, Clone, Deserialize)]
pub struct PoseConfig {
    /// 必須ランドマークの最低visibility
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
    /// 保持するスナップショット数
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// 欠損時に補間する最大フレーム数（0で補間なし）
    #[serde(default = "default_max_interpolation_frames")]
    pub max_interpolation_frames: u32,
    /// 外挿時に直近の差分へ掛ける係数
    #[serde(default = "default_interpolation_decay")]
    pub interpolation_decay: f32,
}

fn default_min_visibility() -> f32 { 0.5 }
fn default_max_history() -> usize { 30 }
fn default_max_interpolation_frames() -> u32 { 5 }
fn default_interpolation_decay() -> f32 { 0.3 }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            min_visibility: default_min_visibility(),
            max_history: default_max_history(),
            max_interpolation_frames: default_max_interpolation_frames(),
            interpolation_decay: default_interpolation_decay(),
        }
    }
}

// --- フェーズ検出 ---

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PhaseConfig {
    /// この角度以下で flexed
    pub flex_threshold: f32,
    /// この角度以上で extended
    pub extend_threshold: f32,
    /// 確定フェーズから抜けるのに必要な余裕（度）
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f32,
    /// フェーズ確定に必要な連続一致フレーム数
    #[serde(default = "default_stability_frames")]
    pub stability_frames: u32,
}

fn default_hysteresis() -> f32 { 10.0 }
fn default_stability_frames() -> u32 { 3 }

impl PhaseConfig {
    pub fn new(flex_threshold: f32, extend_threshold: f32) -> Self {
        Self {
            flex_threshold,
            extend_threshold,
            hysteresis: default_hysteresis(),
            stability_frames: default_stability_frames(),
        }
    }
}

// --- 種目 ---

#[derive(Debug, Clone, Deserialize)]
pub struct CurlConfig {
    #[serde(default = "default_curl_phase")]
    pub front_phase: PhaseConfig,
    #[serde(default = "default_curl_phase")]
    pub profile_phase: PhaseConfig,
    /// 1レップ中に許容する肘-体幹距離の変動幅（肩幅単位）
    #[serde(default = "default_elbow_drift_tolerance")]
    pub elbow_drift_tolerance: f32,
}

fn default_curl_phase() -> PhaseConfig { PhaseConfig::new(70.0, 140.0) }
fn default_elbow_drift_tolerance() -> f32 { 0.35 }

impl Default for CurlConfig {
    fn default() -> Self {
        Self {
            front_phase: default_curl_phase(),
            profile_phase: default_curl_phase(),
            elbow_drift_tolerance: default_elbow_drift_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PressConfig {
    #[serde(default = "default_press_phase")]
    pub phase: PhaseConfig,
    /// アクティブゾーン: 手首の肩からの高さが start 基準からこれ以上下がったら範囲外
    #[serde(default = "default_active_zone_margin")]
    pub active_zone_margin: f32,
    /// 側面から見た肘の前方角度の下限（度）
    #[serde(default = "default_elbow_forward_min")]
    pub elbow_forward_min: f32,
}

fn default_press_phase() -> PhaseConfig { PhaseConfig::new(90.0, 160.0) }
fn default_active_zone_margin() -> f32 { 0.1 }
fn default_elbow_forward_min() -> f32 { 30.0 }

impl Default for PressConfig {
    fn default() -> Self {
        Self {
            phase: default_press_phase(),
            active_zone_margin: default_active_zone_margin(),
            elbow_forward_min: default_elbow_forward_min(),
        }
    }
}

// --- リアルタイムフォーム監視 ---

#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    /// 姿勢系チェックの窓サイズ
    #[serde(default = "default_form_window")]
    pub window: usize,
    /// 窓内でこの回数以上検出されたら警告
    #[serde(default = "default_form_trigger")]
    pub trigger: usize,
    #[serde(default = "default_velocity_window")]
    pub velocity_window: usize,
    #[serde(default = "default_velocity_trigger")]
    pub velocity_trigger: usize,
    /// 肘角度の平滑化速度がこれを超えると「反動」とみなす（度/フレーム）
    #[serde(default = "default_uncontrolled_velocity")]
    pub uncontrolled_velocity: f32,
    /// 肘-体幹距離がこれを超えると肘が開いているとみなす（肩幅単位）
    #[serde(default = "default_elbow_flare_distance")]
    pub elbow_flare_distance: f32,
}

fn default_form_window() -> usize { 15 }
fn default_form_trigger() -> usize { 10 }
fn default_velocity_window() -> usize { 10 }
fn default_velocity_trigger() -> usize { 6 }
fn default_uncontrolled_velocity() -> f32 { 15.0 }
fn default_elbow_flare_distance() -> f32 { 1.6 }

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            window: default_form_window(),
            trigger: default_form_trigger(),
            velocity_window: default_velocity_window(),
            velocity_trigger: default_velocity_trigger(),
            uncontrolled_velocity: default_uncontrolled_velocity(),
            elbow_flare_distance: default_elbow_flare_distance(),
        }
    }
}

// --- キャリブレーション ---

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// 測定バッファの容量
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// 外れ値判定（平均 ± sigma × 標準偏差）
    #[serde(default = "default_outlier_sigma")]
    pub outlier_sigma: f32,
    /// 採用する測定の標準偏差上限
    #[serde(default = "default_max_std_dev")]
    pub max_std_dev: f32,
    /// 保存先パス
    #[serde(default = "default_calibration_output")]
    pub output_path: String,
}

fn default_window_size() -> usize { 20 }
fn default_outlier_sigma() -> f32 { 2.0 }
fn default_max_std_dev() -> f32 { 3.0 }
fn default_calibration_output() -> String { "user_calibration.json".to_string() }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            outlier_sigma: default_outlier_sigma(),
            max_std_dev: default_max_std_dev(),
            output_path: default_calibration_output(),
        }
    }
}

// --- セッション ---

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 種目開始前に必要なニュートラル姿勢の連続フレーム数
    #[serde(default = "default_neutral_frames")]
    pub neutral_frames: u32,
    /// ニュートラル判定: 両肘がこの角度より伸びている
    #[serde(default = "default_neutral_angle")]
    pub neutral_angle: f32,
    /// repsPerExercise に無い種目の目標回数
    #[serde(default = "default_reps")]
    pub default_reps: u32,
    #[serde(default)]
    pub rest_between_rounds: bool,
    /// セット完了時にドライバが自動で次へ進む
    #[serde(default = "default_auto_advance")]
    pub auto_advance: bool,
    /// 新フレーム待ちのポーリング間隔（ミリ秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_neutral_frames() -> u32 { 15 }
fn default_neutral_angle() -> f32 { 150.0 }
fn default_reps() -> u32 { 10 }
fn default_auto_advance() -> bool { true }
fn default_poll_interval_ms() -> u64 { 5 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            neutral_frames: default_neutral_frames(),
            neutral_angle: default_neutral_angle(),
            default_reps: default_reps(),
            rest_between_rounds: false,
            auto_advance: default_auto_advance(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// --- ログ ---

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// RUST_LOG が無い時のフィルタ
    #[serde(default = "default_log_level")]
    pub level: String,
    /// ログファイル出力先（未指定ならstderrのみ）
    #[serde(default = "default_log_dir")]
    pub dir: Option<String>,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> Option<String> { Some("logs".to_string()) }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.pose.max_history, 30);
        assert_eq!(config.session.neutral_frames, 15);
        assert_eq!(config.curl.front_phase.stability_frames, 3);
        assert!((config.smoothing.angle.velocity_threshold - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml_str = r#"
            [press.phase]
            flex_threshold = 85.0
            extend_threshold = 155.0

            [session]
            default_reps = 12
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.press.phase.flex_threshold, 85.0);
        assert_eq!(config.press.phase.hysteresis, 10.0);
        assert_eq!(config.session.default_reps, 12);
        assert_eq!(config.session.neutral_frames, 15);
        assert!((config.press.elbow_forward_min - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_smoother_section_optional_fields() {
        let toml_str = r#"
            [smoothing.angle]
            base_smoothing = 0.5
            velocity_threshold = 4.0
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.smoothing.angle.base_smoothing, 0.5);
        assert_eq!(config.smoothing.angle.min_factor, 0.1);
        assert_eq!(config.smoothing.trunk, SmootherConfig::new(0.4, 3.0));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let path = std::env::temp_dir().join("rep_coach_no_such_config.toml");
        assert!(Config::load(&path).is_err());
        let config = Config::load_or_default(&path);
        assert_eq!(config.session.default_reps, 10);
    }
}
