//! Frame sources for the mind mirror.
//!
//! Real webcam drivers live outside this crate; anything that can hand over
//! an encoded still image implements [`FrameSource`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::DeviceError;

/// One encoded still image.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub captured_at: DateTime<Utc>,
}

/// A camera-like device. `open` acquires it, `release` must free it.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), DeviceError>;
    fn capture(&mut self) -> Result<Frame, DeviceError>;
    fn release(&mut self);
    fn is_open(&self) -> bool;
}

/// Reads the newest image (JPEG, PNG, WebP, ...) from a snapshot directory.
///
/// Useful with tools that periodically dump webcam stills to disk.
#[derive(Debug)]
pub struct DirectoryCamera {
    dir: PathBuf,
    open: bool,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn newest_image(&self) -> Result<(PathBuf, &'static str), DeviceError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| map_io(&self.dir, e))?;

        let mut newest: Option<(SystemTime, PathBuf, &'static str)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(mime) = mime_for(&path) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map_or(true, |(t, _, _)| modified >= *t) {
                newest = Some((modified, path, mime));
            }
        }

        newest
            .map(|(_, path, mime)| (path, mime))
            .ok_or_else(|| DeviceError::CaptureFailed(format!("no frames in {}", self.dir.display())))
    }
}

impl FrameSource for DirectoryCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        fs::read_dir(&self.dir).map_err(|e| map_io(&self.dir, e))?;
        self.open = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, DeviceError> {
        if !self.open {
            return Err(DeviceError::Unavailable("camera not opened".into()));
        }
        let (path, mime_type) = self.newest_image()?;
        let bytes = fs::read(&path)
            .map_err(|e| DeviceError::CaptureFailed(format!("{}: {e}", path.display())))?;
        if bytes.is_empty() {
            return Err(DeviceError::CaptureFailed(format!("{} is empty", path.display())));
        }
        Ok(Frame {
            bytes,
            mime_type,
            captured_at: Utc::now(),
        })
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path)
        .first_raw()
        .filter(|mime| mime.starts_with("image/"))
}

fn map_io(dir: &Path, err: std::io::Error) -> DeviceError {
    match err.kind() {
        ErrorKind::PermissionDenied => DeviceError::PermissionDenied(dir.display().to_string()),
        _ => DeviceError::Unavailable(format!("{}: {err}", dir.display())),
    }
}
