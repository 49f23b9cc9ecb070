//! Process-wide output directory setting.
//!
//! One mutable path shared by every request. Each batch snapshots the value
//! once (via [`OutputDir::ensure`]) and keeps writing there even if another
//! request moves the setting mid-flight.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{env, fs};

pub struct OutputDir {
    path: Mutex<PathBuf>,
}

impl OutputDir {
    pub fn new(initial: PathBuf) -> Self {
        OutputDir {
            path: Mutex::new(absolutize(&initial)),
        }
    }

    /// Snapshot the current directory and make sure it exists on disk.
    /// Creation is idempotent; an existing directory is not an error.
    pub fn ensure(&self) -> Result<PathBuf, ConvertError> {
        let path = self.current();
        ensure_exists(&path)?;
        Ok(path)
    }

    /// Replace the output directory. Relative paths resolve against the
    /// process working directory. The new directory is created eagerly so a
    /// bad path fails here rather than mid-batch.
    pub fn set(&self, user_path: &str) -> Result<PathBuf, ConvertError> {
        if user_path.trim().is_empty() {
            return Err(ConvertError::InvalidPath);
        }
        let resolved = absolutize(Path::new(user_path));
        ensure_exists(&resolved)?;
        *self.lock() = resolved.clone();
        log::info!("output directory set to {}", resolved.display());
        Ok(resolved)
    }

    /// Reveal the current directory in the host file manager. Best effort;
    /// a refusal is reported but never fatal to the process.
    pub fn open_in_file_manager(&self) -> Result<(), ConvertError> {
        let path = self.current();
        webbrowser::open(&format!("file://{}", path.display()))
            .map_err(|e| ConvertError::FileManager(e.to_string()))
    }

    pub fn current(&self) -> PathBuf {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PathBuf> {
        self.path.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn ensure_exists(path: &Path) -> Result<(), ConvertError> {
    fs::create_dir_all(path).map_err(|e| ConvertError::DirectoryCreate {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join("out");
        let dir = OutputDir::new(target.clone());

        assert!(!target.exists());
        let got = dir.ensure().unwrap();
        assert_eq!(got, target);
        assert!(target.is_dir());

        // Idempotent.
        dir.ensure().unwrap();
    }

    #[test]
    fn set_resolves_relative_paths() {
        let dir = OutputDir::new(std::env::temp_dir());
        let rel = "target/test-output-dir/sub";

        let resolved = dir.set(rel).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("target/test-output-dir/sub"));
        assert!(resolved.is_dir());
        assert_eq!(dir.current(), resolved);

        fs::remove_dir_all(resolved.parent().unwrap()).ok();
    }

    #[test]
    fn set_rejects_blank_paths() {
        let dir = OutputDir::new(std::env::temp_dir());
        assert!(matches!(dir.set(""), Err(ConvertError::InvalidPath)));
        assert!(matches!(dir.set("   "), Err(ConvertError::InvalidPath)));
    }

    #[test]
    fn ensure_fails_on_file_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let clash = tmp.path().join("not-a-dir");
        fs::write(&clash, b"occupied").unwrap();

        let dir = OutputDir::new(clash);
        assert!(matches!(
            dir.ensure(),
            Err(ConvertError::DirectoryCreate { .. })
        ));
    }
}
