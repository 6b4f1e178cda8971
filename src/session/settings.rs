use crate::exercise::ExerciseKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_REPS: u32 = 10;
pub const DEFAULT_ROUNDS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("exercise list is empty")]
    NoExercises,
    #[error("rounds must be at least 1")]
    ZeroRounds,
    #[error("target reps for {0} must be at least 1")]
    ZeroReps(ExerciseKind),
}

/// フロントエンドから受け取る設定。旧形式（`repsPerSet` のみ）も受け付ける
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    exercises: Option<Vec<ExerciseKind>>,
    #[serde(default)]
    reps_per_exercise: BTreeMap<ExerciseKind, u32>,
    reps_per_set: Option<u32>,
    rounds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSettings")]
pub struct TrainingSettings {
    exercises: Vec<ExerciseKind>,
    reps_per_exercise: BTreeMap<ExerciseKind, u32>,
    /// `reps_per_exercise` に無い種目の目標回数
    reps_per_set: u32,
    rounds: u32,
}

impl TryFrom<RawSettings> for TrainingSettings {
    type Error = SettingsError;

    fn try_from(raw: RawSettings) -> Result<Self, SettingsError> {
        let exercises = raw.exercises.unwrap_or_else(|| ExerciseKind::ALL.to_vec());
        let reps_per_set = raw.reps_per_set.unwrap_or(DEFAULT_REPS);
        let reps_per_exercise = if raw.reps_per_exercise.is_empty() {
            exercises.iter().map(|&e| (e, reps_per_set)).collect()
        } else {
            raw.reps_per_exercise
        };
        Self::with_reps(
            exercises,
            reps_per_exercise,
            reps_per_set,
            raw.rounds.unwrap_or(DEFAULT_ROUNDS),
        )
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            exercises: ExerciseKind::ALL.to_vec(),
            reps_per_exercise: ExerciseKind::ALL.iter().map(|&e| (e, DEFAULT_REPS)).collect(),
            reps_per_set: DEFAULT_REPS,
            rounds: DEFAULT_ROUNDS,
        }
    }
}

impl TrainingSettings {
    /// 全種目同じ目標回数
    pub fn uniform(exercises: Vec<ExerciseKind>, reps: u32, rounds: u32) -> Result<Self, SettingsError> {
        let per_exercise = exercises.iter().map(|&e| (e, reps)).collect();
        Self::with_reps(exercises, per_exercise, reps, rounds)
    }

    pub fn with_reps(
        exercises: Vec<ExerciseKind>,
        reps_per_exercise: BTreeMap<ExerciseKind, u32>,
        reps_per_set: u32,
        rounds: u32,
    ) -> Result<Self, SettingsError> {
        if exercises.is_empty() {
            return Err(SettingsError::NoExercises);
        }
        if rounds == 0 {
            return Err(SettingsError::ZeroRounds);
        }
        let settings = Self {
            exercises,
            reps_per_exercise,
            reps_per_set,
            rounds,
        };
        if let Some(&kind) = settings.exercises.iter().find(|&&e| settings.target_reps(e) == 0) {
            return Err(SettingsError::ZeroReps(kind));
        }
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("Invalid training settings")?;
        Ok(settings)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn exercises(&self) -> &[ExerciseKind] {
        &self.exercises
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn target_reps(&self, kind: ExerciseKind) -> u32 {
        self.reps_per_exercise
            .get(&kind)
            .copied()
            .unwrap_or(self.reps_per_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_exercise_format() {
        let s = TrainingSettings::from_json(
            r#"{"exercises":["overhead_press"],"repsPerExercise":{"overhead_press":8},"rounds":2}"#,
        )
        .unwrap();
        assert_eq!(s.exercises(), &[ExerciseKind::OverheadPress]);
        assert_eq!(s.target_reps(ExerciseKind::OverheadPress), 8);
        assert_eq!(s.target_reps(ExerciseKind::BicepCurl), DEFAULT_REPS);
        assert_eq!(s.rounds(), 2);
    }

    #[test]
    fn test_legacy_reps_per_set() {
        let s = TrainingSettings::from_json(r#"{"repsPerSet":12}"#).unwrap();
        assert_eq!(s.exercises(), &ExerciseKind::ALL);
        assert_eq!(s.target_reps(ExerciseKind::BicepCurl), 12);
        assert_eq!(s.target_reps(ExerciseKind::OverheadPress), 12);
        assert_eq!(s.rounds(), DEFAULT_ROUNDS);
    }

    #[test]
    fn test_empty_object_is_default() {
        let s = TrainingSettings::from_json("{}").unwrap();
        assert_eq!(s, TrainingSettings::default());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(TrainingSettings::from_json(r#"{"rounds":0}"#).is_err());
        assert!(TrainingSettings::from_json(r#"{"exercises":[]}"#).is_err());
        assert!(TrainingSettings::from_json(r#"{"exercises":["squat"]}"#).is_err());
        assert_eq!(
            TrainingSettings::uniform(vec![ExerciseKind::BicepCurl], 0, 1),
            Err(SettingsError::ZeroReps(ExerciseKind::BicepCurl))
        );
        assert_eq!(
            TrainingSettings::uniform(Vec::new(), 5, 1),
            Err(SettingsError::NoExercises)
        );
    }

    #[test]
    fn test_serialized_form_reloads() {
        let s = TrainingSettings::uniform(vec![ExerciseKind::BicepCurl], 6, 4).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"repsPerExercise\""));
        assert_eq!(TrainingSettings::from_json(&json).unwrap(), s);
    }
}
