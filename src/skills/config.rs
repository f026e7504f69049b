//! Persisted skills configuration
//!
//! Only the disabled list is persisted, as JSON under the user's home
//! directory. A missing file means nothing is disabled.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Skill names the user switched off
    #[serde(default)]
    pub disabled_skills: Vec<String>,
}

impl SkillsConfig {
    /// Default location: `~/.shellvisor/skills.json`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".shellvisor").join("skills.json")
    }

    /// Load from disk; a missing file yields the default config
    pub fn load(path: &Path) -> std::io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Persist to disk, creating parent directories as needed
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_skills.iter().any(|s| s == name)
    }

    /// Add to the disabled list; returns false if already present
    pub fn disable(&mut self, name: &str) -> bool {
        if self.is_disabled(name) {
            return false;
        }
        self.disabled_skills.push(name.to_string());
        true
    }

    /// Remove from the disabled list; returns false if not present
    pub fn enable(&mut self, name: &str) -> bool {
        let before = self.disabled_skills.len();
        self.disabled_skills.retain(|s| s != name);
        self.disabled_skills.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SkillsConfig::load(&tmp.path().join("nope.json")).unwrap();
        assert!(config.disabled_skills.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("skills.json");

        let mut config = SkillsConfig::default();
        assert!(config.disable("summarize"));
        assert!(!config.disable("summarize"));
        config.save(&path).unwrap();

        let loaded = SkillsConfig::load(&path).unwrap();
        assert!(loaded.is_disabled("summarize"));
        assert!(!loaded.is_disabled("explain"));
    }

    #[test]
    fn test_enable_removes_from_disabled() {
        let mut config = SkillsConfig::default();
        config.disable("a");
        assert!(config.enable("a"));
        assert!(!config.enable("a"));
        assert!(!config.is_disabled("a"));
    }
}
