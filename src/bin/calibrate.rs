use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use rep_coach::calibration::{save_calibration, CalibrationController};
use rep_coach::config::Config;
use rep_coach::logging;
use rep_coach::pose::load_recording;

#[derive(Parser, Debug)]
#[command(name = "calibrate")]
#[command(about = "Derive personal thresholds from a recorded calibration routine")]
struct Args {
    /// JSON Lines recording of the calibration poses
    recording: PathBuf,

    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Output path (defaults to calibration.output_path in the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the overhead press steps
    #[arg(long)]
    no_press: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };
    logging::init(&config.log, "calibrate")?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.calibration.output_path));

    println!("=== キャリブレーション ===");
    println!("  窓サイズ: {}", config.calibration.window_size);
    println!("  許容標準偏差: {}", config.calibration.max_std_dev);
    println!("  プレス: {}", if args.no_press { "なし" } else { "あり" });
    println!("  出力先: {}", output.display());
    println!();

    println!("[1/3] 記録読み込み中...");
    let ticks = load_recording(&args.recording)?;
    println!("  {} フレーム", ticks.len());

    println!("[2/3] 計測中...");
    let mut calibrator = CalibrationController::new(&config, !args.no_press);
    println!("  > {}", calibrator.instruction());
    for (i, tick) in ticks.iter().enumerate() {
        let progress = calibrator.process_frames(tick.front.as_ref(), tick.profile.as_ref());
        if let Some(message) = progress.accepted {
            println!("  [{}] {}", i, message);
            if !progress.complete {
                println!("  > {}", progress.instruction);
            }
        }
        if progress.complete {
            break;
        }
    }

    let Some(data) = calibrator.calibration_data() else {
        bail!(
            "記録の終わりまでに完了しませんでした（{:?}: {}）",
            calibrator.step(),
            calibrator.instruction()
        );
    };

    println!("[3/3] 保存中...");
    save_calibration(&output, &data)?;
    println!("  右腕: {:.1}° - {:.1}°", data.right_min_angle, data.right_max_angle);
    println!("  左腕: {:.1}° - {:.1}°", data.left_min_angle, data.left_max_angle);
    println!("  → {}", output.display());
    Ok(())
}
