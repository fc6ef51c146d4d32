use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the output directory: `<exe_dir>/output/`
pub fn get_output_dir() -> PathBuf {
    get_exe_dir().join("output")
}

/// Returns the catalog directory: `<exe_dir>/catalogs/`
pub fn get_catalog_dir() -> PathBuf {
    get_exe_dir().join("catalogs")
}

/// Session folder name for a run started at `started`, e.g. `20240501_183000`.
pub fn session_dir_name(started: DateTime<Local>) -> String {
    started.format("%Y%m%d_%H%M%S").to_string()
}

/// Creates `<base>/<YYYYMMDD_HHMMSS>/` for one extraction run.
pub fn create_session_dir(base: &Path, started: DateTime<Local>) -> Result<PathBuf> {
    let dir = base.join(session_dir_name(started));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create session folder: {}", dir.display()))?;
    Ok(dir)
}
