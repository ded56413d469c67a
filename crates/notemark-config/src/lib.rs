use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Largest code block (in UTF-16 code units) handed to the token highlighter.
pub const DEFAULT_CODE_SIZE_CAP: u32 = 3000;
/// Size cap used instead of [`DEFAULT_CODE_SIZE_CAP`] in simplified mode.
pub const DEFAULT_SIMPLIFIED_CODE_SIZE_CAP: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub notes_path: PathBuf,
    #[serde(default)]
    pub editor: EditorSettings,
}

/// Host preferences consumed by the highlighting engine.
///
/// Every field has a default so a config file only needs to name the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Never hand code blocks to the token highlighter; always use flat styling.
    pub skip_highlighting: bool,
    /// Use the lower code size cap.
    pub simplified_mode: bool,
    /// Render Markdown markers invisible.
    pub hide_syntax: bool,
    pub dark_mode: bool,
    pub body_font: String,
    pub body_font_size: f32,
    pub code_font: String,
    pub code_font_size: f32,
    pub code_size_cap: u32,
    pub simplified_code_size_cap: u32,
    /// Language ids the token highlighter claims to support but mangles.
    pub unsupported_languages: Vec<String>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            skip_highlighting: false,
            simplified_mode: false,
            hide_syntax: false,
            dark_mode: false,
            body_font: "Helvetica Neue".to_string(),
            body_font_size: 14.0,
            code_font: "Source Code Pro".to_string(),
            code_font_size: 13.0,
            code_size_cap: DEFAULT_CODE_SIZE_CAP,
            simplified_code_size_cap: DEFAULT_SIMPLIFIED_CODE_SIZE_CAP,
            unsupported_languages: Vec::new(),
        }
    }
}

impl EditorSettings {
    /// The code size cap that applies under the current mode.
    pub fn active_code_size_cap(&self) -> u32 {
        if self.simplified_mode {
            self.simplified_code_size_cap
        } else {
            self.code_size_cap
        }
    }

    pub fn is_language_unsupported(&self, language: &str) -> bool {
        self.unsupported_languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
    }
}

impl Config {
    pub fn new(notes_path: PathBuf) -> Self {
        Self {
            notes_path,
            editor: EditorSettings::default(),
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config.notes_path = Self::expand_path(&config.notes_path).unwrap_or(config.notes_path);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/notemark");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
