use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[cfg(test)]
mod config_tests {
    use super::*;
    use claude_pulse::config::{Config, SourceKind};
    use claude_pulse::live::ResponseOrdering;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        // Test logging defaults
        assert_eq!(config.logging.level, "ERROR");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "console");

        // Test path defaults
        assert!(config
            .paths
            .snapshot_file
            .ends_with(".claude/claudepulse-usage.json"));
        assert!(config.paths.watch_directory.ends_with(".claude/projects"));
        assert_eq!(config.paths.log_directory, PathBuf::from("logs"));

        // Test source defaults
        assert_eq!(config.source.kind, SourceKind::File);
        assert!(config.source.command.is_empty());
        assert_eq!(config.source.timeout_secs, 30);

        // Test refresh defaults
        assert_eq!(config.refresh.ordering, ResponseOrdering::LastResolved);
        assert_eq!(config.refresh.push_debounce_ms, 5_000);
        assert!(config.refresh.watch_enabled);
    }

    #[test]
    fn test_env_variable_override() {
        // Set environment variables
        env::set_var("CLAUDE_PULSE_SOURCE_COMMAND", "pulse-producer --json --hours 5");
        env::set_var("CLAUDE_PULSE_ORDERING", "latest-issued");
        env::set_var("CLAUDE_PULSE_SNAPSHOT_FILE", "/tmp/pulse/usage.json");
        env::set_var("LOG_FORMAT", "json");

        let mut config = Config::default();
        config
            .apply_env_overrides()
            .expect("Failed to apply env overrides");

        assert_eq!(config.source.kind, SourceKind::Command);
        assert_eq!(config.source.command, "pulse-producer");
        assert_eq!(config.source.args, ["--json", "--hours", "5"]);
        assert_eq!(config.refresh.ordering, ResponseOrdering::LatestIssued);
        assert_eq!(
            config.paths.snapshot_file,
            PathBuf::from("/tmp/pulse/usage.json")
        );
        assert_eq!(config.logging.format, "json");

        // Invalid values are reported, not ignored
        env::set_var("CLAUDE_PULSE_ORDERING", "fifo");
        assert!(Config::default().apply_env_overrides().is_err());

        // Cleanup
        env::remove_var("CLAUDE_PULSE_SOURCE_COMMAND");
        env::remove_var("CLAUDE_PULSE_ORDERING");
        env::remove_var("CLAUDE_PULSE_SNAPSHOT_FILE");
        env::remove_var("LOG_FORMAT");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Test valid config
        assert!(config.validate().is_ok());

        // Level matching ignores case
        config.logging.level = "Debug".to_string();
        assert!(config.validate().is_ok());

        // Reset and test invalid output
        config = Config::default();
        config.logging.output = "syslog".to_string();
        assert!(config.validate().is_err());

        // Reset and test command source without a command
        config = Config::default();
        config.source.kind = SourceKind::Command;
        assert!(config.validate().is_err());
        config.source.command = "pulse-producer".to_string();
        assert!(config.validate().is_ok());

        // Reset and test zero timeout
        config = Config::default();
        config.source.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_output_creates_log_directory() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let log_dir = temp_dir.path().join("nested").join("logs");

        let mut config = Config::default();
        config.logging.output = "file".to_string();
        config.paths.log_directory = log_dir.clone();

        assert!(config.validate().is_ok());
        assert!(log_dir.is_dir());
    }

    #[test]
    fn test_config_file_loading() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test-config.toml");

        // Create test config file
        let test_config = r#"
[logging]
level = "DEBUG"
format = "json"
output = "console"

[paths]
settings_file = "/custom/settings.json"
snapshot_file = "/custom/usage.json"
watch_directory = "/custom/projects"

[source]
kind = "command"
command = "pulse-producer"
args = ["--window"]
timeout_secs = 10

[refresh]
ordering = "latest_issued"
push_debounce_ms = 1000
watch_enabled = false
        "#;

        fs::write(&config_path, test_config).expect("Failed to write test config");

        // Load config from file
        let config = Config::load_from_file(&config_path).expect("Failed to load config");

        // Verify loaded values
        assert_eq!(config.logging.level, "DEBUG");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.paths.settings_file, PathBuf::from("/custom/settings.json"));
        assert_eq!(config.paths.log_directory, PathBuf::from("logs"));
        assert_eq!(config.source.kind, SourceKind::Command);
        assert_eq!(config.source.args, ["--window"]);
        assert_eq!(config.source.timeout_secs, 10);
        assert_eq!(config.refresh.ordering, ResponseOrdering::LatestIssued);
        assert_eq!(config.refresh.push_debounce_ms, 1000);
        assert!(!config.refresh.watch_enabled);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[source\nkind = ").expect("Failed to write test config");

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        let missing = temp_dir.path().join("absent.toml");
        assert!(Config::load_from_file(&missing).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        // Test TOML serialization
        let toml_string = toml::to_string_pretty(&config).expect("Failed to serialize to TOML");
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("[paths]"));
        assert!(toml_string.contains("[source]"));
        assert!(toml_string.contains("[refresh]"));
        assert!(toml_string.contains("ordering = \"last_resolved\""));

        // Test round-trip
        let deserialized: Config =
            toml::from_str(&toml_string).expect("Failed to deserialize TOML");
        assert_eq!(config.logging.level, deserialized.logging.level);
        assert_eq!(config.source.kind, deserialized.source.kind);
        assert_eq!(
            config.refresh.push_debounce_ms,
            deserialized.refresh.push_debounce_ms
        );
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("saved.toml");

        let mut config = Config::default();
        config.source.timeout_secs = 12;
        config.refresh.watch_enabled = false;
        config.save_to_file(&config_path).expect("Failed to save config");

        let reloaded = Config::load_from_file(&config_path).expect("Failed to reload config");
        assert_eq!(reloaded.source.timeout_secs, 12);
        assert!(!reloaded.refresh.watch_enabled);
    }
}
