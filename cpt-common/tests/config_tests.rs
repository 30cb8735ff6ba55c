//! Integration tests for bootstrap configuration
//!
//! Uses serial_test to prevent ENV variable race conditions. Tests that
//! manipulate CPT_ROOT_FOLDER or the API key variables are marked #[serial].

use cpt_common::config::{
    CompiledDefaults, Role, RootFolderInitializer, RootFolderResolver, SheetMatch, TomlConfig,
    API_KEY_ENVS, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new("test-module");
    let root_folder = resolver.resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    let test_path = "/tmp/cpt-test-env-folder";
    env::set_var(ROOT_FOLDER_ENV, test_path);

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from(test_path));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/cpt-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/cpt-from-toml")),
        ..TomlConfig::default()
    };

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_config(&config)
        .with_cli_arg(Some(PathBuf::from("/tmp/cpt-from-cli")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/cpt-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/cpt-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/cpt-from-toml")),
        ..TomlConfig::default()
    };

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_config(&config)
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/cpt-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_config(&config)
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/cpt-from-toml"));
}

#[test]
fn test_initializer_creates_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(
        TomlConfig::default().database_path_in(initializer.root_folder()),
        root.join("progress.db")
    );
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.port, 5780);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.users.len(), 2);
}

#[test]
fn test_invalid_config_file_is_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(TomlConfig::load_or_default(Some(&path)).is_err());
}

#[test]
fn test_partial_config_fills_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
port = 8080

[logging]
level = "debug"

[layout.weekly]
sheet = "Weekly"
sheet_match = "exact"

[[users]]
username = "viewer"
password = "secret"
role = "leadership"
"#,
    )
    .unwrap();

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.logging.level, "debug");

    // Untouched layout labels keep their defaults
    assert_eq!(config.layout.weekly.sheet, "Weekly");
    assert_eq!(config.layout.weekly.sheet_match, SheetMatch::Exact);
    assert_eq!(config.layout.weekly.cumulative_work_done, "Lũy kế đến nay");
    assert_eq!(config.layout.contract.sheet, "Mẫu số 11C");

    // Configured users replace the built-in pair
    assert_eq!(config.users.len(), 1);
    assert_eq!(config.users[0].role, Role::Leadership);
}

#[test]
fn test_database_path_override() {
    let config = TomlConfig {
        database_path: Some(PathBuf::from("/srv/cpt/custom.db")),
        ..TomlConfig::default()
    };
    assert_eq!(
        config.database_path_in(&PathBuf::from("/ignored")),
        PathBuf::from("/srv/cpt/custom.db")
    );

    let config = TomlConfig::default();
    assert_eq!(
        config.database_path_in(&PathBuf::from("/srv/cpt")),
        PathBuf::from("/srv/cpt/progress.db")
    );
}

#[test]
#[serial]
fn test_api_key_env_beats_toml() {
    for name in API_KEY_ENVS {
        env::remove_var(name);
    }

    let mut config = TomlConfig::default();
    config.completion.api_key = Some("toml-key".to_string());
    assert_eq!(config.completion.resolve_api_key().as_deref(), Some("toml-key"));

    env::set_var("OPENAI_API_KEY", "openai-key");
    assert_eq!(config.completion.resolve_api_key().as_deref(), Some("openai-key"));

    env::set_var("CPT_COMPLETION_API_KEY", "cpt-key");
    assert_eq!(config.completion.resolve_api_key().as_deref(), Some("cpt-key"));

    for name in API_KEY_ENVS {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_blank_api_key_is_ignored() {
    for name in API_KEY_ENVS {
        env::remove_var(name);
    }

    let mut config = TomlConfig::default();
    config.completion.api_key = Some("   ".to_string());
    assert!(config.completion.resolve_api_key().is_none());
}
