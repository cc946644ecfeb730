//! ASCII-safe staging for source paths the decoder may not handle.
//!
//! Staged copies live in the process temp directory until the process exits.
//! A controller may be torn down and rebuilt while a decoder still points at
//! a staged file, so cleanup is tied to [`StagingGuard`], not to the controller.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

static STAGED: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// Return a path the decoder can open.
///
/// ASCII paths come back unchanged. Anything else is copied to
/// `<tmp>/video_<unix-millis><.ext>` and the copy is registered for deletion
/// at process exit.
pub fn stage_if_needed(path: &Path) -> Result<PathBuf> {
    let is_ascii = path.to_str().map(|s| s.is_ascii()).unwrap_or(false);
    if is_ascii {
        return Ok(path.to_path_buf());
    }

    let staged = std::env::temp_dir().join(staged_file_name(path));
    fs::copy(path, &staged).with_context(|| {
        format!(
            "Failed to stage {} as {}",
            path.display(),
            staged.display()
        )
    })?;

    tracing::info!(
        "Staged non-ASCII path {} as {}",
        path.display(),
        staged.display()
    );
    register(staged.clone());
    Ok(staged)
}

fn staged_file_name(path: &Path) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!("video_{millis}{extension}")
}

fn register(path: PathBuf) {
    if let Ok(mut staged) = STAGED.lock() {
        staged.push(path);
    }
}

/// Paths currently awaiting cleanup.
pub fn staged_paths() -> Vec<PathBuf> {
    STAGED.lock().map(|s| s.clone()).unwrap_or_default()
}

/// Delete every staged copy. Returns how many files were removed.
pub fn cleanup() -> usize {
    let drained: Vec<PathBuf> = match STAGED.lock() {
        Ok(mut staged) => staged.drain(..).collect(),
        Err(_) => return 0,
    };

    let mut removed = 0;
    for path in drained {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => tracing::warn!("Could not remove staged {}: {}", path.display(), err),
        }
    }
    removed
}

/// Held by `main` for the lifetime of the process; deletes staged copies on drop.
#[derive(Debug, Default)]
pub struct StagingGuard;

impl Drop for StagingGuard {
    fn drop(&mut self) {
        let removed = cleanup();
        if removed > 0 {
            tracing::debug!("Removed {} staged video copies", removed);
        }
    }
}
