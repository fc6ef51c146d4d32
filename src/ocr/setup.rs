use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const TRAINED_DATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5",
    "/usr/share/tesseract-ocr/4.00",
    "/usr/share",
    "/usr/local/share",
    "/opt/homebrew/share",
];

#[derive(Clone, Debug, PartialEq)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

impl TesseractPaths {
    /// Finds both the executable and a tessdata directory holding English data.
    pub fn discover() -> Result<Self> {
        let paths = Self {
            executable: find_tesseract_executable()?,
            tessdata: find_tessdata_dir()?,
        };
        info!(
            "Using Tesseract {} with tessdata {}",
            paths.executable.display(),
            paths.tessdata.display()
        );
        Ok(paths)
    }
}

/// Returns the per-user directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hud-telemetry")
        .join("tesseract")
}

/// Finds the Tesseract executable: `TESSERACT_PATH`, our local dir, `PATH`,
/// then common install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    if let Ok(explicit) = std::env::var("TESSERACT_PATH") {
        let p = PathBuf::from(explicit);
        if p.exists() {
            return Ok(p);
        }
        debug!("TESSERACT_PATH {} does not exist", p.display());
    }

    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join(EXECUTABLE_NAME);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing English trained data.
pub fn find_tessdata_dir() -> Result<PathBuf> {
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        if let Some(found) = tessdata_in(Path::new(&prefix)) {
            return Ok(found);
        }
    }

    if let Some(found) = tessdata_in(&get_tesseract_dir()) {
        return Ok(found);
    }

    for dir in COMMON_INSTALL_DIRS {
        if let Some(found) = tessdata_in(Path::new(dir)) {
            return Ok(found);
        }
    }

    Err(anyhow!(
        "tessdata directory not found. Please ensure {} is available.",
        TRAINED_DATA
    ))
}

/// Accepts either a tessdata directory or its parent.
fn tessdata_in(dir: &Path) -> Option<PathBuf> {
    [dir.to_path_buf(), dir.join("tessdata")]
        .into_iter()
        .find(|candidate| candidate.join(TRAINED_DATA).exists())
}

/// Makes sure English trained data is present in the per-user directory,
/// downloading it when missing. Returns the tessdata directory.
pub fn ensure_tessdata() -> Result<PathBuf> {
    let tessdata_dir = get_tesseract_dir().join("tessdata");
    if tessdata_dir.join(TRAINED_DATA).exists() {
        info!("tessdata found at: {}", tessdata_dir.display());
        return Ok(tessdata_dir);
    }

    fs::create_dir_all(&tessdata_dir)
        .with_context(|| format!("Failed to create {}", tessdata_dir.display()))?;
    download_tessdata(&tessdata_dir)?;
    Ok(tessdata_dir)
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, TRAINED_DATA);
    let target = tessdata_dir.join(TRAINED_DATA);

    info!("Downloading {}...", TRAINED_DATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "hud-telemetry")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            TRAINED_DATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&target)?;
    file.write_all(&bytes)?;

    info!("Downloaded {} ({} bytes)", TRAINED_DATA, bytes.len());
    Ok(())
}
