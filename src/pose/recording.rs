use super::LandmarkFrame;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// 記録の1行（1ティック分）。姿勢が検出されなかったビューは `null` か省略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedTick {
    #[serde(default)]
    pub front: Option<LandmarkFrame>,
    #[serde(default)]
    pub profile: Option<LandmarkFrame>,
}

/// JSON Lines 形式の記録を読む。空行は無視する
pub fn parse_recording<R: BufRead>(reader: R) -> Result<Vec<RecordedTick>> {
    let mut ticks = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let tick: RecordedTick = serde_json::from_str(&line)
            .with_context(|| format!("Invalid landmark record on line {}", i + 1))?;
        ticks.push(tick);
    }
    Ok(ticks)
}

pub fn load_recording<P: AsRef<Path>>(path: P) -> Result<Vec<RecordedTick>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open recording {}", path.display()))?;
    parse_recording(BufReader::new(file)).with_context(|| format!("in {}", path.display()))
}
