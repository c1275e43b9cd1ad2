//! Startup environment checks: capture tool, analysis tool, and the sound
//! card enumeration interface must all be present before the daemon spawns.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::config::ToolsConfig;
use crate::core::errors::{NoisedError, Result};

/// One required piece of the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub what: &'static str,
    pub path: PathBuf,
    pub hint: &'static str,
}

/// Requirements in the order they are checked.
#[must_use]
pub fn requirements(tools: &ToolsConfig) -> Vec<Requirement> {
    vec![
        Requirement {
            what: "capture tool",
            path: tools.capture.clone(),
            hint: "install package alsa-utils",
        },
        Requirement {
            what: "analysis tool",
            path: tools.analysis.clone(),
            hint: "install package sox",
        },
        Requirement {
            what: "sound card enumeration",
            path: tools.cards.clone(),
            hint: "is the ALSA kernel driver loaded?",
        },
    ]
}

/// Fail with [`NoisedError::EnvironmentMissing`] on the first absent requirement.
pub fn check(tools: &ToolsConfig) -> Result<()> {
    check_with(tools, Path::exists)
}

fn check_with(tools: &ToolsConfig, exists: impl Fn(&Path) -> bool) -> Result<()> {
    for req in requirements(tools) {
        if !exists(&req.path) {
            tracing::error!(what = req.what, path = %req.path.display(), "preflight failed");
            return Err(NoisedError::EnvironmentMissing {
                what: req.what,
                path: req.path,
                hint: format!(". Please {}", req.hint),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    #[test]
    fn all_present_passes() {
        assert!(check_with(&ToolsConfig::default(), |_| true).is_ok());
    }

    #[test]
    fn missing_analysis_tool_is_reported_by_name() {
        let tools = ToolsConfig::default();
        let err = check_with(&tools, |p| p != tools.analysis.as_path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EnvironmentMissing);
        let msg = err.to_string();
        assert!(msg.contains("analysis tool"), "{msg}");
        assert!(msg.contains("sox"), "{msg}");
    }

    #[test]
    fn capture_tool_is_checked_first() {
        let err = check_with(&ToolsConfig::default(), |_| false).unwrap_err();
        assert!(err.to_string().contains("capture tool"));
    }

    #[test]
    fn real_filesystem_check_uses_configured_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let capture = tmp.path().join("arecord");
        let analysis = tmp.path().join("sox");
        let cards = tmp.path().join("cards");
        for p in [&capture, &analysis] {
            std::fs::write(p, "").unwrap();
        }
        let tools = ToolsConfig {
            capture,
            analysis,
            cards: cards.clone(),
        };
        assert!(check(&tools).is_err());
        std::fs::write(&cards, " 0 [Device]: USB-Audio\n").unwrap();
        assert!(check(&tools).is_ok());
    }
}
