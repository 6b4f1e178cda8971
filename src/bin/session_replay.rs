use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use rep_coach::calibration::{load_calibration_or_default, save_calibration};
use rep_coach::config::Config;
use rep_coach::exercise::ExerciseKind;
use rep_coach::logging;
use rep_coach::pose::{load_recording, LandmarkFrame};
use rep_coach::session::settings::DEFAULT_ROUNDS;
use rep_coach::session::{
    save_completion, DriverOutput, FrameFeed, SessionDriver, SharedSession,
    TrainingSessionController, TrainingSettings,
};

#[derive(Parser, Debug)]
#[command(name = "session_replay")]
#[command(about = "Replay a two-camera landmark recording through a full training session")]
struct Args {
    /// JSON Lines recording, one {"front": .., "profile": ..} object per frame
    recording: PathBuf,

    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Training settings JSON (exercises, repsPerExercise, rounds)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Calibration record to load, and to write when calibration runs
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Run calibration even if a calibrated record exists
    #[arg(long)]
    force_calibration: bool,

    /// Playback rate of the producer threads
    #[arg(long, default_value = "30")]
    fps: f32,

    #[arg(short, long, default_value = "completion.json")]
    output: PathBuf,

    /// Print every driver output to stdout as JSON Lines
    #[arg(long)]
    events: bool,
}

/// 1カメラ分のフレームを一定間隔で流す
fn spawn_producer(
    feed: FrameFeed,
    frames: Vec<Option<LandmarkFrame>>,
    interval: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for frame in frames {
            feed.publish(frame);
            thread::sleep(interval);
        }
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };
    logging::init(&config.log, "replay")?;

    let ticks = load_recording(&args.recording)?;
    tracing::info!("{} frames from {}", ticks.len(), args.recording.display());

    let settings = match &args.settings {
        Some(path) => TrainingSettings::load(path)?,
        None => TrainingSettings::uniform(
            ExerciseKind::ALL.to_vec(),
            config.session.default_reps,
            DEFAULT_ROUNDS,
        )?,
    };
    let calibration_path = args
        .calibration
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.calibration.output_path));
    let stored = load_calibration_or_default(&calibration_path);

    let controller =
        TrainingSessionController::new(settings, &config, Some(stored), args.force_calibration);
    let calibrating = controller.needs_calibration();
    println!("=== セッション再生 ===");
    println!("  種目: {:?}", controller.settings().exercises());
    println!("  ラウンド数: {}", controller.settings().rounds());
    println!("  キャリブレーション: {}", if calibrating { "実行" } else { "保存済み" });
    println!();

    let session = SharedSession::new(controller);
    let front = FrameFeed::new();
    let profile = FrameFeed::new();
    let mut driver = SessionDriver::new(session.clone(), front.clone(), profile.clone(), &config.session);
    let stop = driver.stop_handle();

    let interval = Duration::from_secs_f32(1.0 / args.fps.max(1.0));
    let (front_frames, profile_frames): (Vec<_>, Vec<_>) =
        ticks.into_iter().map(|t| (t.front, t.profile)).unzip();
    let producers = vec![
        spawn_producer(profile, profile_frames, interval),
        spawn_producer(front, front_frames, interval),
    ];
    let watcher = thread::spawn(move || {
        for producer in producers {
            if producer.join().is_err() {
                tracing::warn!("producer thread panicked");
            }
        }
        stop.store(true, Ordering::Release);
    });

    let print_all = args.events;
    let processed = driver.run(|output| {
        if print_all {
            match serde_json::to_string(&output) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("failed to encode output: {}", e),
            }
        }
        if let DriverOutput::Event(event) = &output {
            tracing::info!("{:?}", event);
        }
    });
    if watcher.join().is_err() {
        tracing::warn!("watcher thread panicked");
    }
    println!("{} フレームを処理", processed);

    if calibrating {
        match session.with(|s| s.calibration_data().cloned()) {
            Some(data) => {
                save_calibration(&calibration_path, &data)?;
                println!("キャリブレーション保存: {}", calibration_path.display());
            }
            None => println!("キャリブレーションは完了しませんでした"),
        }
    }

    let (complete, record) = session.with(|s| (s.is_complete(), s.completion_stats()));
    if !complete {
        tracing::warn!("recording ended before the session completed; writing partial stats");
    }
    save_completion(&args.output, &record)?;
    println!(
        "合計レップ: {}, エラー: {} → {}",
        record.total_reps,
        record.total_errors,
        args.output.display()
    );
    Ok(())
}
