// Environment-driven configuration
//
// Paths come from the environment and may be overridden per-command by CLI
// flags. Directory existence is checked up front so a bad path fails the run
// before any session record is created.

use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{DB_FILENAME, GEONAMES_DEFAULT_DIR};
use crate::error::{DarkroomError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub import_path: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
    pub thumbnails_path: Option<PathBuf>,
    pub geonames_path: PathBuf,
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            import_path: env_path("IMPORT_PATH"),
            library_path: env_path("LIBRARY_PATH"),
            export_path: env_path("EXPORT_PATH"),
            thumbnails_path: env_path("THUMBNAILS_PATH"),
            geonames_path: env_path("GEONAMES_PATH")
                .unwrap_or_else(|| PathBuf::from(GEONAMES_DEFAULT_DIR)),
            db_path: env_path("DARKROOM_DB"),
        }
    }

    pub fn import_path(&self) -> Result<&Path> {
        required(self.import_path.as_deref(), "IMPORT_PATH")
    }

    pub fn library_path(&self) -> Result<&Path> {
        required(self.library_path.as_deref(), "LIBRARY_PATH")
    }

    pub fn export_path(&self) -> Result<&Path> {
        required(self.export_path.as_deref(), "EXPORT_PATH")
    }

    /// Thumbnails default to living beside the library when unset.
    pub fn thumbnails_path(&self) -> Result<PathBuf> {
        match &self.thumbnails_path {
            Some(p) => Ok(p.clone()),
            None => Ok(self.library_path()?.join(".thumbnails")),
        }
    }

    /// The database lives inside the library root unless DARKROOM_DB is set.
    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => Ok(self.library_path()?.join(DB_FILENAME)),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => Some(PathBuf::from(v)),
        _ => None,
    }
}

fn required<'a>(value: Option<&'a Path>, key: &str) -> Result<&'a Path> {
    value.ok_or_else(|| DarkroomError::Other(format!("{} must be set", key)))
}

/// Verify every path is an existing directory.
pub fn check_directories(paths: &[&Path]) -> Result<()> {
    for path in paths {
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DarkroomError::InvalidPath(format!("directory does not exist: {}", path.display()))
            } else {
                DarkroomError::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(DarkroomError::InvalidPath(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_directories_rejects_missing() {
        let err = check_directories(&[Path::new("/definitely/not/here")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn check_directories_rejects_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = check_directories(&[tmp.path()]).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
