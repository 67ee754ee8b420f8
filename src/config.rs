use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("ticklist")
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("todos.db")
}

/// Suggestions offered when picking a category. The store accepts any label.
fn default_categories() -> Vec<String> {
    vec![
        "Work".into(),
        "Personal".into(),
        "Shopping".into(),
        "Health".into(),
        "Other".into(),
    ]
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TicklistConfig {
    pub database_path: PathBuf,
    pub categories: Vec<String>,
    pub debug_logging: bool,
}

impl Default for TicklistConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            categories: default_categories(),
            debug_logging: false,
        }
    }
}

impl TicklistConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ticklist")
            .join("config.json")
    }

    /// Read the config file. A missing file is not an error and yields the
    /// defaults; a file that exists but does not parse is.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`TicklistConfig::read`], but logs problems and falls back to
    /// defaults. Install the logger first or the warning is lost.
    pub fn load(path: &Path) -> Self {
        Self::read(path).unwrap_or_else(|e| {
            log::warn!("Ignoring config {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn is_suggested_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}
