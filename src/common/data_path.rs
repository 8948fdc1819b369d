// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "DATA_DIR";

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn env_data_dir() -> Option<String> {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the session data directory using precedence:
/// 1) explicit configured directory
/// 2) `DATA_DIR`
/// 3) cwd-relative `./data`
pub fn resolve_data_dir(explicit_data_dir: Option<&str>) -> PathBuf {
    let dir = explicit_data_dir
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(env_data_dir)
        .unwrap_or_else(|| "data".to_string());
    absolute(PathBuf::from(dir))
}

/// Absolute paths pass through; relative ones land inside the data directory.
pub fn resolve_data_file(raw: &str, explicit_data_dir: Option<&str>) -> PathBuf {
    let path = Path::new(raw.trim());
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let relative = path.strip_prefix("data").unwrap_or(path);
    resolve_data_dir(explicit_data_dir).join(relative)
}
