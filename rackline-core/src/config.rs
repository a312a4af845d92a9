use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    history: HistoryConfig,
    #[serde(default)]
    parameters: ParametersConfig,
    #[serde(default)]
    view: ViewConfig,
    #[serde(default)]
    project: ProjectConfig,
}

#[derive(Deserialize, Default)]
struct HistoryConfig {
    max_depth: Option<usize>,
    coalesce_window_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ParametersConfig {
    flush_min_ms: Option<u64>,
    flush_max_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ViewConfig {
    visible_tracks: Option<u32>,
    visible_slots: Option<u32>,
}

#[derive(Deserialize, Default)]
struct ProjectConfig {
    default_slots: Option<u32>,
}

pub struct Config {
    history: HistoryConfig,
    parameters: ParametersConfig,
    view: ViewConfig,
    project: ProjectConfig,
}

impl Config {
    /// Embedded defaults merged with `<config_dir>/rackline/config.toml`.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::from_user_toml(None),
        }
    }

    /// Embedded defaults merged with the file at `path`. Unreadable or
    /// malformed files are logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_user_toml(Some(&contents)),
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e);
                Self::from_user_toml(None)
            }
        }
    }

    pub fn from_user_toml(user: Option<&str>) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });

        if let Some(contents) = user {
            match toml::from_str::<ConfigFile>(contents) {
                Ok(user) => merge(&mut base, user),
                Err(e) => log::warn!(target: "config", "ignoring malformed config: {}", e),
            }
        }

        Config {
            history: base.history,
            parameters: base.parameters,
            view: base.view,
            project: base.project,
        }
    }

    /// Undo steps kept (clamped to 1..=10000).
    pub fn history_max_depth(&self) -> usize {
        self.history.max_depth.unwrap_or(200).clamp(1, 10_000)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.history.coalesce_window_ms.unwrap_or(500))
    }

    /// Fastest and slowest parameter flush cadence; max is never below min.
    pub fn flush_interval(&self) -> (Duration, Duration) {
        let min = self.parameters.flush_min_ms.unwrap_or(15).max(1);
        let max = self.parameters.flush_max_ms.unwrap_or(250).max(min);
        (Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn visible_tracks(&self) -> u32 {
        self.view.visible_tracks.unwrap_or(8).max(1)
    }

    pub fn visible_slots(&self) -> u32 {
        self.view.visible_slots.unwrap_or(8).max(1)
    }

    pub fn default_slots(&self) -> u32 {
        self.project.default_slots.unwrap_or(8).clamp(1, 256)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_user_toml(None)
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rackline").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.history.max_depth.is_some() {
        base.history.max_depth = user.history.max_depth;
    }
    if user.history.coalesce_window_ms.is_some() {
        base.history.coalesce_window_ms = user.history.coalesce_window_ms;
    }
    if user.parameters.flush_min_ms.is_some() {
        base.parameters.flush_min_ms = user.parameters.flush_min_ms;
    }
    if user.parameters.flush_max_ms.is_some() {
        base.parameters.flush_max_ms = user.parameters.flush_max_ms;
    }
    if user.view.visible_tracks.is_some() {
        base.view.visible_tracks = user.view.visible_tracks;
    }
    if user.view.visible_slots.is_some() {
        base.view.visible_slots = user.view.visible_slots;
    }
    if user.project.default_slots.is_some() {
        base.project.default_slots = user.project.default_slots;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = Config::default();
        assert_eq!(config.history_max_depth(), 200);
        assert_eq!(config.coalesce_window(), Duration::from_millis(500));
        assert_eq!(
            config.flush_interval(),
            (Duration::from_millis(15), Duration::from_millis(250))
        );
        assert_eq!(config.default_slots(), 8);
    }

    #[test]
    fn user_values_override_defaults() {
        let config = Config::from_user_toml(Some(
            "[history]\nmax_depth = 5\n[view]\nvisible_slots = 4\n",
        ));
        assert_eq!(config.history_max_depth(), 5);
        assert_eq!(config.visible_slots(), 4);
        // Untouched keys keep their defaults.
        assert_eq!(config.coalesce_window(), Duration::from_millis(500));
        assert_eq!(config.visible_tracks(), 8);
    }

    #[test]
    fn malformed_user_config_is_ignored() {
        let config = Config::from_user_toml(Some("[history\nmax_depth = ="));
        assert_eq!(config.history_max_depth(), 200);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = Config::from_user_toml(Some(
            "[history]\nmax_depth = 0\n[parameters]\nflush_min_ms = 100\nflush_max_ms = 10\n",
        ));
        assert_eq!(config.history_max_depth(), 1);
        let (min, max) = config.flush_interval();
        assert_eq!(min, max);
    }

    #[test]
    fn load_from_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(config.visible_tracks(), 8);

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[project]\ndefault_slots = 3\n").unwrap();
        assert_eq!(Config::load_from(&path).default_slots(), 3);
    }
}
