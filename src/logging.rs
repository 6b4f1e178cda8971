//! Subscriber setup shared by the binaries.

use crate::config::LogConfig;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// `<dir>/<name>_YYYYmmdd_HHMMSS.log` を作る
pub fn open_log_file<P: AsRef<Path>>(dir: P, name: &str) -> Result<(File, PathBuf)> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_{}.log", name, ts));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    Ok((file, path))
}

/// stderr と（`dir` 指定時は）ファイルへ出力する。ログファイルのパスを返す
///
/// フィルタは `RUST_LOG` があればそれを、無ければ `level` を使う。
pub fn init(config: &LogConfig, name: &str) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, path) = match &config.dir {
        Some(dir) => {
            let (file, path) = open_log_file(dir, name)?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("{} ({})", name, env!("GIT_VERSION"));
    if let Some(path) = &path {
        tracing::info!("log: {}", path.display());
    }
    Ok(path)
}
