//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration is a TOML file read once at startup. Root folder
//! resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `CPT_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CPT_ROOT_FOLDER";

/// Environment variables holding the completion API key, in priority order
pub const API_KEY_ENVS: [&str; 2] = ["CPT_COMPLETION_API_KEY", "OPENAI_API_KEY"];

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "progress.db";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path; defaults to `<root>/progress.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted spreadsheet upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    /// Login credentials; the built-in pair is used when none are configured
    #[serde(default = "default_users")]
    pub users: Vec<UserCredential>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            logging: LoggingConfig::default(),
            completion: CompletionConfig::default(),
            layout: LayoutConfig::default(),
            users: default_users(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load configuration, falling back to built-in defaults
    ///
    /// A missing file is not fatal: a warning is logged and defaults apply.
    /// A file that exists but does not parse is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    warn!("Could not determine config directory, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let config = Self::load(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the database path for a given root folder
    pub fn database_path_in(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Settings for the external chat-completion service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Connect timeout, and total timeout of one-shot requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Language the narrative is written in
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            language: default_language(),
        }
    }
}

impl CompletionConfig {
    /// Resolve the API key
    ///
    /// **Priority:** ENV (`CPT_COMPLETION_API_KEY`, then `OPENAI_API_KEY`) → TOML
    pub fn resolve_api_key(&self) -> Option<String> {
        let env_key = API_KEY_ENVS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|key| is_valid_key(key));
        let toml_key = self.api_key.clone().filter(|key| is_valid_key(key));

        if env_key.is_some() && toml_key.is_some() {
            warn!("Completion API key found in environment and TOML. Using environment.");
        }

        env_key.or(toml_key)
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// How a sheet is chosen from the uploaded workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetMatch {
    /// Sheet name equals the configured name
    Exact,
    /// Sheet name contains the configured text, case-insensitively
    Contains,
}

/// Sheet and column labels of the contract baseline workbook
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractLayout {
    pub sheet: String,
    pub sheet_match: SheetMatch,
    /// First-column label identifying the header row
    pub header_marker: String,
    pub stt: String,
    pub name: String,
    pub unit: String,
    pub volume: String,
}

impl Default for ContractLayout {
    fn default() -> Self {
        Self {
            sheet: "Mẫu số 11C".to_string(),
            sheet_match: SheetMatch::Exact,
            header_marker: "STT".to_string(),
            stt: "STT".to_string(),
            name: "Mô tả công việc".to_string(),
            unit: "Đơn vị tính".to_string(),
            volume: "Khối lượng".to_string(),
        }
    }
}

/// Sheet and column labels of the weekly report workbook
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeeklyLayout {
    pub sheet: String,
    pub sheet_match: SheetMatch,
    pub header_marker: String,
    pub stt: String,
    pub name: String,
    pub unit: String,
    pub work_done_this_week: String,
    pub cumulative_work_done: String,
    pub notes: String,
}

impl Default for WeeklyLayout {
    fn default() -> Self {
        Self {
            sheet: "bc tuần".to_string(),
            sheet_match: SheetMatch::Contains,
            header_marker: "STT".to_string(),
            stt: "STT".to_string(),
            name: "Tên công việc".to_string(),
            unit: "Đơn vị".to_string(),
            work_done_this_week: "Khối lượng thực hiện trong tuần".to_string(),
            cumulative_work_done: "Lũy kế đến nay".to_string(),
            notes: "Ghi chú".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub contract: ContractLayout,
    #[serde(default)]
    pub weekly: WeeklyLayout,
}

/// Dashboard role returned by a successful login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Project management board: uploads contract and weekly reports
    DataEntry,
    /// Leadership: reads dashboards and narratives
    Leadership,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserCredential {
    pub username: String,
    pub password: String,
    pub role: Role,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_language() -> String {
    "Vietnamese".to_string()
}

fn default_users() -> Vec<UserCredential> {
    vec![
        UserCredential {
            username: "banqlda".to_string(),
            password: "123".to_string(),
            role: Role::DataEntry,
        },
        UserCredential {
            username: "lanhdaoban".to_string(),
            password: "123".to_string(),
            role: Role::Leadership,
        },
    ]
}

/// Platform defaults compiled into the binary
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: get_default_root_folder(),
        }
    }
}

/// Resolves the root folder using the 4-tier priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Priority 1: command-line argument
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Priority 3: `root_folder` from the loaded TOML config
    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("{}: root folder from {}", self.module_name, ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!("{}: root folder from TOML config", self.module_name);
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives file locations inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// Default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cpt").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/cpt (or /var/lib/cpt for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("cpt"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cpt"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("cpt"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cpt"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("cpt"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cpt"))
    } else {
        PathBuf::from("./cpt_data")
    }
}
