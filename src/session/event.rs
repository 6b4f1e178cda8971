use super::controller::ExerciseStats;
use crate::exercise::ExerciseKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// セッション遷移の通知。表示・音声側はこれだけを見て案内する
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    NewExercise {
        exercise: ExerciseKind,
        name: &'static str,
        round: u32,
        total_rounds: u32,
    },
    NewRound {
        exercise: ExerciseKind,
        name: &'static str,
        round: u32,
        total_rounds: u32,
    },
    PreviousExercise {
        exercise: ExerciseKind,
        name: &'static str,
        round: u32,
    },
    PreviousRound {
        exercise: ExerciseKind,
        name: &'static str,
        round: u32,
    },
    /// 完了時の集計。`total_reps` は種目ごとの完了レップ数の合計
    TrainingComplete {
        total_right_reps: u32,
        total_left_reps: u32,
        total_reps: u32,
        total_errors: u32,
        exercise_stats: BTreeMap<ExerciseKind, ExerciseStats>,
    },
    AtStart,
}

impl SessionEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::TrainingComplete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags() {
        let v = serde_json::to_value(SessionEvent::NewRound {
            exercise: ExerciseKind::BicepCurl,
            name: ExerciseKind::BicepCurl.display_name(),
            round: 2,
            total_rounds: 3,
        })
        .unwrap();
        assert_eq!(v["event"], "new_round");
        assert_eq!(v["exercise"], "bicep_curl");
        assert_eq!(v["total_rounds"], 3);

        let mut stats = BTreeMap::new();
        stats.insert(
            ExerciseKind::OverheadPress,
            ExerciseStats {
                reps: 8,
                errors: 1,
                ..Default::default()
            },
        );
        let complete = SessionEvent::TrainingComplete {
            total_right_reps: 8,
            total_left_reps: 8,
            total_reps: 8,
            total_errors: 1,
            exercise_stats: stats,
        };
        assert!(complete.is_complete());
        let v = serde_json::to_value(&complete).unwrap();
        assert_eq!(v["event"], "training_complete");
        assert_eq!(v["total_reps"], 8);
        assert_eq!(v["total_errors"], 1);
        assert_eq!(v["exercise_stats"]["overhead_press"]["reps"], 8);

        let v = serde_json::to_value(SessionEvent::AtStart).unwrap();
        assert_eq!(v, serde_json::json!({"event": "at_start"}));
        assert!(!SessionEvent::AtStart.is_complete());
    }
}
