use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;

use crate::config::CaptureBackend;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::llm::types::ContentPart;
use crate::process::run_tool;

/// Writes a PNG of the current screen to a caller-chosen path.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self, path: &Path) -> DeskPilotResult<()>;
}

/// One iteration's screenshot: the PNG on disk plus its base64 encoding.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub path: PathBuf,
    pub base64: String,
}

impl Screenshot {
    pub fn load(path: &Path) -> DeskPilotResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            DeskPilotError::Perception(format!("cannot read screenshot {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        })
    }

    pub fn image_part(&self) -> ContentPart {
        ContentPart::png_base64(&self.base64)
    }
}

/// Captures the primary monitor through `xcap`.
pub struct XcapCapture;

#[async_trait]
impl ScreenCapture for XcapCapture {
    async fn capture(&self, path: &Path) -> DeskPilotResult<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || capture_primary_to(&path))
            .await
            .map_err(|e| DeskPilotError::Perception(format!("capture task failed: {e}")))?
    }
}

fn capture_primary_to(path: &Path) -> DeskPilotResult<()> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| DeskPilotError::Perception(format!("cannot enumerate monitors: {e}")))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary())
        .or_else(|| monitors.first())
        .ok_or_else(|| DeskPilotError::Perception("no monitor found".into()))?;
    let image = monitor
        .capture_image()
        .map_err(|e| DeskPilotError::Perception(format!("screen capture failed: {e}")))?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| DeskPilotError::Perception(format!("cannot write {}: {e}", path.display())))?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "primary monitor captured"
    );
    Ok(())
}

/// Captures through the `scrot` command-line tool.
pub struct ScrotCapture;

#[async_trait]
impl ScreenCapture for ScrotCapture {
    async fn capture(&self, path: &Path) -> DeskPilotResult<()> {
        let target = path.to_string_lossy();
        run_tool("scrot", &["--overwrite", target.as_ref()])
            .await
            .map_err(DeskPilotError::Perception)?;
        Ok(())
    }
}

pub fn capture_backend(backend: CaptureBackend) -> Box<dyn ScreenCapture> {
    match backend {
        CaptureBackend::Xcap => Box::new(XcapCapture),
        CaptureBackend::Scrot => Box::new(ScrotCapture),
    }
}

/// Logs a warning when the captured image does not match the configured screen size.
pub fn check_dimensions(path: &Path, expected: (u32, u32)) {
    match image::image_dimensions(path) {
        Ok(actual) if actual != expected => tracing::warn!(
            actual = %format!("{}x{}", actual.0, actual.1),
            configured = %format!("{}x{}", expected.0, expected.1),
            "screenshot size differs from configured screen size; clicks may land off target"
        ),
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "could not read screenshot dimensions"),
    }
}
