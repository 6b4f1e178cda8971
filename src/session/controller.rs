use super::event::SessionEvent;
use super::settings::TrainingSettings;
use crate::calibration::{CalibrationController, CalibrationData, CalibrationProgress};
use crate::config::{Config, SessionConfig};
use crate::exercise::{ErrorCode, ExerciseController, ExerciseKind, RepOutcome};
use crate::pose::{geometry, LandmarkFrame, LandmarkId};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Calibration,
    Exercise,
    Rest,
    Completed,
}

/// 種目ごとの累計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseStats {
    pub reps: u32,
    pub errors: u32,
    pub error_details: BTreeMap<ErrorCode, u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub exercise_index: usize,
    /// 1始まり
    pub round: u32,
    pub right_reps: u32,
    pub left_reps: u32,
    pub total_right_reps: u32,
    pub total_left_reps: u32,
    pub waiting_for_neutral: bool,
    pub neutral_frames: u32,
    pub total_errors: u32,
    pub exercise_stats: BTreeMap<ExerciseKind, ExerciseStats>,
}

/// 状態変化のたびに表示側へ送るペイロード
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatePayload {
    pub phase: SessionPhase,
    pub current_exercise: &'static str,
    pub current_exercise_type: ExerciseKind,
    pub exercise_index: usize,
    pub total_exercises: usize,
    pub current_round: u32,
    pub total_rounds: u32,
    pub target_reps: u32,
    pub right_reps: u32,
    pub left_reps: u32,
    pub waiting_for_neutral: bool,
}

/// 履歴保存用の完了記録
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub total_reps: u32,
    pub total_errors: u32,
    pub exercise_stats: BTreeMap<ExerciseKind, ExerciseStats>,
    pub completed_at: DateTime<Local>,
}

/// 1ティックの処理結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SessionUpdate {
    Calibration(CalibrationProgress),
    Exercise(RepOutcome),
    /// 休憩中・完了後などフレームを使わなかった
    Idle,
}

/// 両肘が十分に伸びていればニュートラル姿勢
fn is_neutral_pose(frame: Option<&LandmarkFrame>, min_visibility: f32, min_angle: f32) -> bool {
    const ARMS: [[LandmarkId; 3]; 2] = [
        [LandmarkId::RightShoulder, LandmarkId::RightElbow, LandmarkId::RightWrist],
        [LandmarkId::LeftShoulder, LandmarkId::LeftElbow, LandmarkId::LeftWrist],
    ];
    let Some(frame) = frame else {
        return false;
    };
    ARMS.iter().all(|ids| {
        frame.all_visible(ids, min_visibility)
            && geometry::angle(frame.point(ids[0]), frame.point(ids[1]), frame.point(ids[2]))
                .is_some_and(|a| a > min_angle)
    })
}

/// 1セッション分の状態機械
///
/// キャリブレーション → 種目 → (休憩) → ... → 完了。
/// 種目に入るたびに解析器を作り直し、ニュートラル姿勢を確認してからレップを受け付ける。
pub struct TrainingSessionController {
    settings: TrainingSettings,
    config: Config,
    state: SessionState,
    calibration: Option<CalibrationData>,
    calibrator: Option<CalibrationController>,
    exercise: Option<ExerciseController>,
}

impl TrainingSessionController {
    /// 保存済みのキャリブレーションがあり `force_calibration` でなければ種目から始める
    pub fn new(
        settings: TrainingSettings,
        config: &Config,
        calibration: Option<CalibrationData>,
        force_calibration: bool,
    ) -> Self {
        let exercise_stats = settings
            .exercises()
            .iter()
            .map(|&e| (e, ExerciseStats::default()))
            .collect();
        let state = SessionState {
            phase: SessionPhase::Calibration,
            exercise_index: 0,
            round: 1,
            right_reps: 0,
            left_reps: 0,
            total_right_reps: 0,
            total_left_reps: 0,
            waiting_for_neutral: true,
            neutral_frames: 0,
            total_errors: 0,
            exercise_stats,
        };
        let mut session = Self {
            settings,
            config: config.clone(),
            state,
            calibration: None,
            calibrator: None,
            exercise: None,
        };

        match calibration.filter(|c| c.calibrated && !force_calibration) {
            Some(data) => session.start_exercise_phase(data),
            None => {
                let with_press = session
                    .settings
                    .exercises()
                    .contains(&ExerciseKind::OverheadPress);
                session.calibrator = Some(CalibrationController::new(config, with_press));
                tracing::info!("session starts with calibration");
            }
        }
        session
    }

    /// キャリブレーション結果を受け取り、1ラウンド目の最初の種目へ
    pub fn start_exercise_phase(&mut self, calibration: CalibrationData) {
        self.calibration = Some(calibration);
        self.calibrator = None;
        self.state.phase = SessionPhase::Exercise;
        self.state.exercise_index = 0;
        self.state.round = 1;
        self.init_current_exercise();
    }

    fn init_current_exercise(&mut self) {
        let kind = self.current_exercise();
        let calibration = self.calibration.clone().unwrap_or_default();
        self.exercise = Some(ExerciseController::new(kind, &self.config, &calibration));
        self.state.right_reps = 0;
        self.state.left_reps = 0;
        self.state.waiting_for_neutral = true;
        self.state.neutral_frames = 0;
        tracing::info!(
            "round {}/{}: {} (target {})",
            self.state.round,
            self.settings.rounds(),
            kind,
            self.target_reps()
        );
    }

    pub fn process_frames(
        &mut self,
        front: Option<&LandmarkFrame>,
        profile: Option<&LandmarkFrame>,
    ) -> SessionUpdate {
        match self.state.phase {
            SessionPhase::Calibration => self.process_calibration(front, profile),
            SessionPhase::Exercise => self.process_exercise(front, profile),
            SessionPhase::Rest | SessionPhase::Completed => SessionUpdate::Idle,
        }
    }

    fn process_calibration(
        &mut self,
        front: Option<&LandmarkFrame>,
        profile: Option<&LandmarkFrame>,
    ) -> SessionUpdate {
        let Some(calibrator) = self.calibrator.as_mut() else {
            return SessionUpdate::Idle;
        };
        let progress = calibrator.process_frames(front, profile);
        if let Some(data) = calibrator.calibration_data() {
            self.start_exercise_phase(data);
        }
        SessionUpdate::Calibration(progress)
    }

    fn process_exercise(
        &mut self,
        front: Option<&LandmarkFrame>,
        profile: Option<&LandmarkFrame>,
    ) -> SessionUpdate {
        let SessionConfig {
            neutral_frames,
            neutral_angle,
            ..
        } = self.config.session;

        if self.state.waiting_for_neutral {
            if is_neutral_pose(front, self.config.pose.min_visibility, neutral_angle) {
                self.state.neutral_frames += 1;
                if self.state.neutral_frames >= neutral_frames {
                    self.state.waiting_for_neutral = false;
                    self.state.neutral_frames = 0;
                    tracing::info!("neutral pose confirmed; counting reps");
                }
            } else {
                self.state.neutral_frames = 0;
            }
            let mut outcome = RepOutcome::idle(self.state.right_reps, self.state.left_reps);
            outcome.waiting_for_neutral = true;
            return SessionUpdate::Exercise(outcome);
        }

        let Some(exercise) = self.exercise.as_mut() else {
            return SessionUpdate::Idle;
        };
        let outcome = exercise.process_frames(front, profile);
        self.state.right_reps = outcome.right_reps;
        self.state.left_reps = outcome.left_reps;

        if outcome.is_rejected() {
            self.state.total_errors += 1;
            let kind = self.current_exercise();
            if let Some(stats) = self.state.exercise_stats.get_mut(&kind) {
                stats.errors += 1;
                if let Some(code) = outcome.error_code {
                    *stats.error_details.entry(code).or_insert(0) += 1;
                }
            }
        }
        SessionUpdate::Exercise(outcome)
    }

    /// 現在の種目の目標回数に達したか。プレスは右腕、カールは左右両方
    pub fn check_set_complete(&self) -> bool {
        if self.state.phase != SessionPhase::Exercise {
            return false;
        }
        let target = self.target_reps();
        match self.current_exercise() {
            ExerciseKind::OverheadPress => self.state.right_reps >= target,
            ExerciseKind::BicepCurl => {
                self.state.right_reps >= target && self.state.left_reps >= target
            }
        }
    }

    /// 現在のセットを集計して次の種目・ラウンドへ進む
    pub fn advance_to_next(&mut self) -> SessionEvent {
        match self.state.phase {
            SessionPhase::Calibration => return SessionEvent::AtStart,
            SessionPhase::Completed => return self.complete_event(),
            // 新ラウンドの最初の種目はまだ始まっていないので、休憩を終えるだけ
            SessionPhase::Rest => {
                self.resume();
                let kind = self.current_exercise();
                return SessionEvent::NewExercise {
                    exercise: kind,
                    name: kind.display_name(),
                    round: self.state.round,
                    total_rounds: self.settings.rounds(),
                };
            }
            SessionPhase::Exercise => {}
        }

        let kind = self.current_exercise();
        let completed = match kind {
            ExerciseKind::BicepCurl => self.state.right_reps.min(self.state.left_reps),
            ExerciseKind::OverheadPress => self.state.right_reps,
        };
        if let Some(stats) = self.state.exercise_stats.get_mut(&kind) {
            stats.reps += completed;
        }
        self.state.total_right_reps += self.state.right_reps;
        self.state.total_left_reps += self.state.left_reps;
        self.state.right_reps = 0;
        self.state.left_reps = 0;

        let next_index = self.state.exercise_index + 1;
        if next_index < self.settings.exercises().len() {
            self.state.exercise_index = next_index;
            self.state.phase = SessionPhase::Exercise;
            self.init_current_exercise();
            let kind = self.current_exercise();
            return SessionEvent::NewExercise {
                exercise: kind,
                name: kind.display_name(),
                round: self.state.round,
                total_rounds: self.settings.rounds(),
            };
        }

        if self.state.round >= self.settings.rounds() {
            self.state.phase = SessionPhase::Completed;
            self.exercise = None;
            tracing::info!(
                "training complete: {} right / {} left reps, {} errors",
                self.state.total_right_reps,
                self.state.total_left_reps,
                self.state.total_errors
            );
            return self.complete_event();
        }

        self.state.round += 1;
        self.state.exercise_index = 0;
        self.init_current_exercise();
        self.state.phase = if self.config.session.rest_between_rounds {
            SessionPhase::Rest
        } else {
            SessionPhase::Exercise
        };
        let kind = self.current_exercise();
        SessionEvent::NewRound {
            exercise: kind,
            name: kind.display_name(),
            round: self.state.round,
            total_rounds: self.settings.rounds(),
        }
    }

    /// 集計せずに前の種目へ戻る。先頭では何もしない
    pub fn go_to_previous(&mut self) -> SessionEvent {
        if !matches!(self.state.phase, SessionPhase::Exercise | SessionPhase::Rest) {
            return SessionEvent::AtStart;
        }
        if self.state.exercise_index > 0 {
            self.state.exercise_index -= 1;
            self.state.phase = SessionPhase::Exercise;
            self.init_current_exercise();
            let kind = self.current_exercise();
            return SessionEvent::PreviousExercise {
                exercise: kind,
                name: kind.display_name(),
                round: self.state.round,
            };
        }
        if self.state.round > 1 {
            self.state.round -= 1;
            self.state.exercise_index = self.settings.exercises().len() - 1;
            self.state.phase = SessionPhase::Exercise;
            self.init_current_exercise();
            let kind = self.current_exercise();
            return SessionEvent::PreviousRound {
                exercise: kind,
                name: kind.display_name(),
                round: self.state.round,
            };
        }
        SessionEvent::AtStart
    }

    pub fn go_to_next(&mut self) -> SessionEvent {
        self.advance_to_next()
    }

    /// 休憩を終えて種目を再開する。休憩中でなければ false
    pub fn resume(&mut self) -> bool {
        if self.state.phase != SessionPhase::Rest {
            return false;
        }
        self.state.phase = SessionPhase::Exercise;
        tracing::info!("rest over");
        true
    }

    fn complete_event(&self) -> SessionEvent {
        let record = self.completion_stats();
        SessionEvent::TrainingComplete {
            total_right_reps: self.state.total_right_reps,
            total_left_reps: self.state.total_left_reps,
            total_reps: record.total_reps,
            total_errors: record.total_errors,
            exercise_stats: record.exercise_stats,
        }
    }

    pub fn current_exercise(&self) -> ExerciseKind {
        let exercises = self.settings.exercises();
        exercises
            .get(self.state.exercise_index)
            .or_else(|| exercises.last())
            .copied()
            .unwrap_or(ExerciseKind::BicepCurl)
    }

    pub fn target_reps(&self) -> u32 {
        self.settings.target_reps(self.current_exercise())
    }

    pub fn state_payload(&self) -> SessionStatePayload {
        let kind = self.current_exercise();
        SessionStatePayload {
            phase: self.state.phase,
            current_exercise: kind.display_name(),
            current_exercise_type: kind,
            exercise_index: self.state.exercise_index,
            total_exercises: self.settings.exercises().len(),
            current_round: self.state.round,
            total_rounds: self.settings.rounds(),
            target_reps: self.target_reps(),
            right_reps: self.state.right_reps,
            left_reps: self.state.left_reps,
            waiting_for_neutral: self.state.waiting_for_neutral,
        }
    }

    /// 種目開始時の読み上げ文
    pub fn announcement(&self) -> String {
        format!(
            "Round {} of {}. {}. {} reps.",
            self.state.round,
            self.settings.rounds(),
            self.current_exercise().display_name(),
            self.target_reps()
        )
    }

    pub fn completion_stats(&self) -> CompletionRecord {
        CompletionRecord {
            total_reps: self.state.exercise_stats.values().map(|s| s.reps).sum(),
            total_errors: self.state.total_errors,
            exercise_stats: self.state.exercise_stats.clone(),
            completed_at: Local::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase == SessionPhase::Completed
    }

    pub fn needs_calibration(&self) -> bool {
        self.state.phase == SessionPhase::Calibration
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &TrainingSettings {
        &self.settings
    }

    /// 採用中のキャリブレーション。計測が終わるまでは `None`
    pub fn calibration_data(&self) -> Option<&CalibrationData> {
        self.calibration.as_ref()
    }

    pub fn calibrator(&self) -> Option<&CalibrationController> {
        self.calibrator.as_ref()
    }
}
