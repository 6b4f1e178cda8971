pub mod controller;
pub mod driver;
pub mod event;
pub mod settings;

pub use controller::{
    CompletionRecord, ExerciseStats, SessionPhase, SessionState, SessionStatePayload,
    SessionUpdate, TrainingSessionController,
};
pub use driver::{DriverOutput, FrameFeed, SessionDriver, SharedSession};
pub use event::SessionEvent;
pub use settings::{SettingsError, TrainingSettings};

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 完了記録をJSONで書き出す（履歴ストアへの受け渡し用）
pub fn save_completion<P: AsRef<Path>>(path: P, record: &CompletionRecord) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write completion record {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_save_completion() {
        let record = CompletionRecord {
            total_reps: 12,
            total_errors: 1,
            exercise_stats: BTreeMap::new(),
            completed_at: chrono::Local::now(),
        };
        let path = std::env::temp_dir().join("rep_coach_completion_test.json");
        save_completion(&path, &record).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["totalReps"], 12);
        assert_eq!(value["totalErrors"], 1);
        let _ = fs::remove_file(&path);
    }
}
