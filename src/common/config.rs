use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::layout_engine::{LayoutKind, WindowMode};

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_default()
        .join("tiler")
        .join("config.toml")
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Config {
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub timing: TimingSettings,
}

/// Snapshotted into every root layout when it is created.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default)]
    pub default_layout: LayoutKind,
    #[serde(default)]
    pub default_window_state: WindowMode,
    /// Pixels between tiles and around the edge of the work area.
    #[serde(default = "default_gap_size")]
    pub gap_size: f64,
    /// Pixels each window of a stacking layout is shifted down by.
    #[serde(default = "default_stack_offset")]
    pub stack_offset: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            default_layout: LayoutKind::default(),
            default_window_state: WindowMode::default(),
            gap_size: default_gap_size(),
            stack_offset: default_stack_offset(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct TimingSettings {
    /// How long a new window may keep changing its own geometry before it is
    /// placed.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_grab_release_delay_ms")]
    pub grab_release_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            grab_release_delay_ms: default_grab_release_delay_ms(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.layout.validate());

        issues
    }
}

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.gap_size.is_finite() || self.gap_size < 0.0 {
            issues.push(format!(
                "gap_size must be a non-negative number, got {}",
                self.gap_size
            ));
        }

        if !self.stack_offset.is_finite() || self.stack_offset <= 0.0 {
            issues.push(format!(
                "stack_offset must be positive, got {}",
                self.stack_offset
            ));
        }

        issues
    }
}

fn default_gap_size() -> f64 { 10.0 }

fn default_stack_offset() -> f64 { 10.0 }

fn default_settle_delay_ms() -> u64 { 100 }

fn default_grab_release_delay_ms() -> u64 { 50 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, and falls back to the defaults otherwise.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    /// Save the current config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_file = ConfigFile { settings: self.settings.clone() };

        let toml_string = toml::to_string_pretty(&config_file)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> { self.settings.validate() }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<ConfigFile>(buf) {
            Ok(c) => Ok(Config { settings: c.settings }),
            Err(e) => bail!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_bundled_default_config_matches_defaults() {
        let config = Config::parse(include_str!("../../tiler.default.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_validate_default_is_valid() {
        let issues = Config::default().validate();
        assert!(issues.is_empty(), "Expected no issues, got: {:?}", issues);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_layout_aliases() {
        let config = Config::parse(
            r#"
            [settings.layout]
            default_layout = "split-v"
            default_window_state = "floating"
            gap_size = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.settings.layout.default_layout, LayoutKind::SplitVertical);
        assert_eq!(config.settings.layout.default_window_state, WindowMode::Floating);
        assert_eq!(config.settings.layout.gap_size, 4.0);
        assert_eq!(config.settings.layout.stack_offset, 10.0);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = Config::parse("[settings.layout]\ngaps = 3\n").unwrap_err();
        assert!(err.to_string().contains("gaps"), "{err}");
    }

    #[test]
    fn test_settings_validation_negative_gap() {
        let mut settings = Settings::default();
        settings.layout.gap_size = -1.0;
        let issues = settings.validate();
        assert!(issues.iter().any(|i| i.contains("gap_size must be a non-negative number")));
    }

    #[test]
    fn test_settings_validation_zero_stack_offset() {
        let mut settings = Settings::default();
        settings.layout.stack_offset = 0.0;
        settings.layout.gap_size = f64::NAN;
        let issues = settings.validate();
        assert_eq!(issues.len(), 2, "{issues:?}");
    }

    #[test]
    fn test_save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.settings.layout.default_layout = LayoutKind::Stacking;
        config.settings.timing.settle_delay_ms = 250;
        config.save(&path).unwrap();

        assert_eq!(Config::read(&path).unwrap(), config);
        let missing = dir.path().join("missing.toml");
        assert_eq!(Config::read_or_default(&missing).unwrap(), Config::default());
    }
}
