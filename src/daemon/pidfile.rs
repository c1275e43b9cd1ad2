//! Process record: the running monitor's pid in a plain-text file.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::errors::{NoisedError, Result};

/// Persisted identity of a running monitor process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub path: PathBuf,
}

impl ProcessRecord {
    /// Write `pid` as decimal text, creating parent directories.
    pub fn write(path: impl AsRef<Path>, pid: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| NoisedError::io(parent, e))?;
        }
        std::fs::write(path, pid.to_string()).map_err(|e| NoisedError::io(path, e))?;
        Ok(Self {
            pid,
            path: path.to_path_buf(),
        })
    }

    /// Read a record back. A missing file means no instance is running;
    /// anything else that prevents a clean parse is an unreadable record.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NoisedError::NoRunningInstance {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(NoisedError::ProcessRecordUnreadable {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                });
            }
        };
        let pid = parse_pid(&raw).ok_or_else(|| NoisedError::ProcessRecordUnreadable {
            path: path.to_path_buf(),
            details: format!("{:?} is not a process id", raw.trim()),
        })?;
        Ok(Self {
            pid,
            path: path.to_path_buf(),
        })
    }

    /// Delete the file. Already gone counts as success.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NoisedError::io(&self.path, e)),
        }
    }
}

fn parse_pid(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips_pid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run").join("noised.pid");
        let written = ProcessRecord::write(&path, 4242).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4242");
        assert_eq!(ProcessRecord::read(&path).unwrap(), written);
    }

    #[test]
    fn missing_file_means_no_running_instance() {
        let tmp = TempDir::new().unwrap();
        let err = ProcessRecord::read(tmp.path().join("noised.pid")).unwrap_err();
        assert!(matches!(err, NoisedError::NoRunningInstance { .. }));
        assert_eq!(err.kind(), ErrorKind::ControlFailure);
    }

    #[test]
    fn garbage_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("noised.pid");
        for raw in ["", "abc", "-5", "0", "12 34"] {
            std::fs::write(&path, raw).unwrap();
            let err = ProcessRecord::read(&path).unwrap_err();
            assert!(
                matches!(err, NoisedError::ProcessRecordUnreadable { .. }),
                "{raw:?} -> {err}"
            );
        }
    }

    #[test]
    fn trailing_newline_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("noised.pid");
        std::fs::write(&path, "77\n").unwrap();
        assert_eq!(ProcessRecord::read(&path).unwrap().pid, 77);
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let record = ProcessRecord::write(tmp.path().join("noised.pid"), 9).unwrap();
        record.remove().unwrap();
        assert!(!record.path.exists());
        record.remove().unwrap();
    }
}
