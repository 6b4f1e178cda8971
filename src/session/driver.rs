use super::controller::{SessionStatePayload, SessionUpdate, TrainingSessionController};
use super::event::SessionEvent;
use crate::config::SessionConfig;
use crate::pose::LandmarkFrame;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Slot {
    seq: u64,
    frame: Option<LandmarkFrame>,
}

/// カメラ1台分の最新フレーム置き場
///
/// 書き込み側は上書きするだけでブロックしない。読み出し側はシーケンス番号で新着を判定する。
/// フレームと番号は同じロックの中で更新されるので、常に対応した組として読める。
/// `None` は「そのフレームで姿勢が検出されなかった」。
#[derive(Clone, Default)]
pub struct FrameFeed {
    slot: Arc<Mutex<Slot>>,
}

impl FrameFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Option<LandmarkFrame>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.seq += 1;
        slot.frame = frame;
    }

    /// 新フレームが届くたびに増える
    pub fn seq(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).seq
    }

    pub fn latest(&self) -> Option<LandmarkFrame> {
        self.snapshot().1
    }

    /// シーケンス番号とそのフレーム
    pub fn snapshot(&self) -> (u64, Option<LandmarkFrame>) {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        (slot.seq, slot.frame.clone())
    }
}

/// スレッド間で共有するセッション。操作は常にロック内で完結する
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<TrainingSessionController>>,
}

impl SharedSession {
    pub fn new(controller: TrainingSessionController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// ロックを取って `f` を実行する。別スレッドがパニックしていても続行する
    ///
    /// パニック時点の状態がそのまま残るので、警告を1回出してからポイズンを解除する。
    pub fn with<R>(&self, f: impl FnOnce(&mut TrainingSessionController) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("session lock poisoned by a panicked thread; continuing with its last state");
            self.inner.clear_poison();
            poisoned.into_inner()
        });
        f(&mut guard)
    }

    pub fn state_payload(&self) -> SessionStatePayload {
        self.with(|s| s.state_payload())
    }

    pub fn go_to_previous(&self) -> SessionEvent {
        self.with(|s| s.go_to_previous())
    }

    pub fn go_to_next(&self) -> SessionEvent {
        self.with(|s| s.go_to_next())
    }

    pub fn resume(&self) -> bool {
        self.with(|s| s.resume())
    }

    pub fn is_complete(&self) -> bool {
        self.with(|s| s.is_complete())
    }
}

/// ドライバから外部（表示・音声）への出力
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DriverOutput {
    Update(SessionUpdate),
    Event(SessionEvent),
    State(SessionStatePayload),
}

/// 正面カメラの新着フレームごとに1ティック進めるループ
///
/// 側面カメラはその時点の最新フレームを使う。
pub struct SessionDriver {
    session: SharedSession,
    front: FrameFeed,
    profile: FrameFeed,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    auto_advance: bool,
    last_front_seq: u64,
    ticks: u64,
}

impl SessionDriver {
    pub fn new(session: SharedSession, front: FrameFeed, profile: FrameFeed, config: &SessionConfig) -> Self {
        let last_front_seq = front.seq();
        Self {
            session,
            front,
            profile,
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            auto_advance: config.auto_advance,
            last_front_seq,
            ticks: 0,
        }
    }

    /// true をセットすると、処理待ちのフレームを片付けてから `run` が戻る
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 新着フレームがあれば処理して true
    pub fn tick<F: FnMut(DriverOutput)>(&mut self, emit: &mut F) -> bool {
        let (seq, front) = self.front.snapshot();
        if seq == self.last_front_seq {
            return false;
        }
        self.last_front_seq = seq;
        let profile = self.profile.latest();
        let auto_advance = self.auto_advance;

        let outputs = self.session.with(|s| {
            let before = s.state_payload();
            let mut outputs = vec![DriverOutput::Update(
                s.process_frames(front.as_ref(), profile.as_ref()),
            )];
            if auto_advance && s.check_set_complete() {
                let event = s.advance_to_next();
                tracing::info!("set complete: {:?}", event);
                outputs.push(DriverOutput::Event(event));
            }
            let after = s.state_payload();
            if after != before {
                outputs.push(DriverOutput::State(after));
            }
            outputs
        });

        self.ticks += 1;
        for output in outputs {
            emit(output);
        }
        true
    }

    /// 停止要求かセッション完了まで回す。処理したティック数を返す
    pub fn run<F: FnMut(DriverOutput)>(&mut self, mut emit: F) -> u64 {
        tracing::info!("session driver started");
        loop {
            let stopping = self.stop.load(Ordering::Acquire);
            let processed = self.tick(&mut emit);
            if stopping || self.session.is_complete() {
                break;
            }
            if !processed {
                thread::sleep(self.poll_interval);
            }
        }
        tracing::info!("session driver stopped after {} ticks", self.ticks);
        self.ticks
    }
}
