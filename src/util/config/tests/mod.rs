//! 配置加载测试

use std::io::Write;

use crate::runtime::RuntimeConfig;
use crate::util::config::{load, load_config_file, ConfigError, ReplConfig, UserConfig};

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[cfg(test)]
mod load_tests {
    use super::*;

    #[test]
    fn test_sections_and_defaults() {
        let file = write_config(
            r#"
[runtime]
cpus = 3
red_zone = 32768

[repl]
prompt = "C:/Home> "
"#,
        );
        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.runtime.cpus, Some(3));
        assert_eq!(config.runtime.task_stack, None);
        assert_eq!(config.repl.prompt, "C:/Home> ");
        assert_eq!(config.repl.continuation_prompt, ReplConfig::default().continuation_prompt);
        assert_eq!(config.repl.history_size, 1000);

        let runtime = config.runtime.to_runtime_config();
        let defaults = RuntimeConfig::default();
        assert_eq!(runtime.scheduler.cpus, 3);
        assert_eq!(runtime.trampoline.red_zone, 32768);
        assert_eq!(runtime.trampoline.segment_size, defaults.trampoline.segment_size);
        assert_eq!(runtime.scheduler.default_stack_size, defaults.scheduler.default_stack_size);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = write_config("");
        assert_eq!(load(Some(file.path())).unwrap(), UserConfig::default());
    }

    #[test]
    fn test_serialized_default_loads_back() {
        let text = toml::to_string_pretty(&UserConfig::default()).unwrap();
        let file = write_config(&text);
        assert_eq!(load_config_file(file.path()).unwrap(), UserConfig::default());
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(load(Some(&missing)), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_bad_value_type() {
        let file = write_config("[runtime]\ncpus = \"many\"\n");
        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("invalid config "));
    }
}
