#[cfg(test)]
mod tests {
    use crate::cli::DevArgs;
    use crate::config::{validate, IsleConfig};
    use crate::error::{CliError, ConfigError};
    use serial_test::serial;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    #[test]
    #[serial]
    fn test_defaults_without_any_source() {
        let dir = TempDir::new().unwrap();
        let config = IsleConfig::load(dir.path(), &DevArgs::default()).unwrap();
        assert_eq!(config, IsleConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.debounce_ms, 200);
    }

    #[test]
    #[serial]
    fn test_toml_file_is_read() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("isle.config.toml"),
            "port = 4000\ndebounce_ms = 50\n\n[aliases]\n\"@/\" = \"app\"\n",
        )
        .unwrap();

        let config = IsleConfig::load(dir.path(), &DevArgs::default()).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.aliases.get("@/"), Some(&PathBuf::from("app")));
    }

    #[test]
    #[serial]
    fn test_json_file_is_read() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("isle.config.json"),
            r#"{ "routes_dir": "pages", "watch_ignore": ["*.tmp"] }"#,
        )
        .unwrap();

        let config = IsleConfig::load(dir.path(), &DevArgs::default()).unwrap();
        assert_eq!(config.routes_dir, PathBuf::from("pages"));
        assert_eq!(config.watch_ignore, vec!["*.tmp".to_string()]);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("isle.config.toml"), "port = 4000\nhost = \"0.0.0.0\"\n").unwrap();
        set_env("ISLE_PORT", "5000");
        set_env("ISLE_DEBOUNCE_MS", "75");

        let from_env = IsleConfig::load(dir.path(), &DevArgs::default());
        let args = DevArgs {
            port: Some(6000),
            ..DevArgs::default()
        };
        let from_cli = IsleConfig::load(dir.path(), &args);
        remove_env("ISLE_PORT");
        remove_env("ISLE_DEBOUNCE_MS");

        let from_env = from_env.unwrap();
        assert_eq!(from_env.port, 5000);
        assert_eq!(from_env.debounce_ms, 75);
        assert_eq!(from_env.host, "0.0.0.0");
        assert_eq!(from_cli.unwrap().port, 6000);
    }

    #[test]
    #[serial]
    fn test_unrelated_env_vars_are_ignored() {
        let dir = TempDir::new().unwrap();
        set_env("ISLE_SOMETHING_ELSE", "1");
        let result = IsleConfig::load(dir.path(), &DevArgs::default());
        remove_env("ISLE_SOMETHING_ELSE");
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn test_unset_open_flag_keeps_file_value() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("isle.config.toml"), "open = true\n").unwrap();

        let config = IsleConfig::load(dir.path(), &DevArgs::default()).unwrap();
        assert!(config.open);
    }

    #[test]
    #[serial]
    fn test_explicit_missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let args = DevArgs {
            config: Some(PathBuf::from("custom.toml")),
            ..DevArgs::default()
        };
        let err = IsleConfig::load(dir.path(), &args).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    #[serial]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("isle.config.toml"), "prot = 3000\n").unwrap();

        let err = IsleConfig::load(dir.path(), &DevArgs::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = IsleConfig {
            port: 0,
            ..IsleConfig::default()
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidValue { field, .. }) if field == "port"
        ));

        config.port = 3000;
        config.debounce_ms = 60_000;
        assert!(validate(&config).is_err());

        config.debounce_ms = 100;
        config.routes_dir = PathBuf::from("/abs/routes");
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidValue { field, .. }) if field == "routes_dir"
        ));
    }

    #[test]
    #[serial]
    fn test_custom_config_file_is_structural() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(dir.path().join("config/dev.toml"), "port = 4100\n").unwrap();
        let args = DevArgs {
            config: Some(PathBuf::from("config/dev.toml")),
            ..DevArgs::default()
        };

        let config = IsleConfig::load(dir.path(), &args).unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.config_file, Some(dir.path().join("config/dev.toml")));

        let options = config.to_dev_options(dir.path());
        assert!(options.config_files.contains(&"config/dev.toml".to_string()));
        let rules = isle_dev::ClassifyRules::from_options(&options);
        let change = rules.classify(isle_dev::RawEvent::new(
            dir.path().join("config/dev.toml"),
            isle_dev::RawEventKind::Modified,
        ));
        assert!(change.is_structural());
    }

    #[test]
    #[serial]
    fn test_default_config_file_is_not_listed_twice() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("isle.config.toml"), "port = 4000\n").unwrap();

        let config = IsleConfig::load(dir.path(), &DevArgs::default()).unwrap();
        let options = config.to_dev_options(dir.path());
        let listed = options
            .config_files
            .iter()
            .filter(|f| f.as_str() == "isle.config.toml")
            .count();
        assert_eq!(listed, 1);
    }

    #[test]
    fn test_to_dev_options() {
        let mut config = IsleConfig {
            debounce_ms: 25,
            client_entry: Some(PathBuf::from("app/main.ts")),
            watch_ignore: vec!["*.tmp".to_string()],
            ..IsleConfig::default()
        };
        config.aliases.insert("@/".to_string(), PathBuf::from("app"));

        let options = config.to_dev_options(Path::new("/site"));
        assert_eq!(options.root, PathBuf::from("/site"));
        assert_eq!(options.debounce_ms, 25);
        assert_eq!(options.client_entry_path(), Some(PathBuf::from("/site/app/main.ts")));
        assert!(options.watch_ignore.contains(&"node_modules".to_string()));
        assert!(options.watch_ignore.contains(&"*.tmp".to_string()));
        assert_eq!(config.public_path(Path::new("/site")), PathBuf::from("/site/public"));
    }
}
