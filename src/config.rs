use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default settings-file location, consulted when no --config is given.
pub const DEFAULT_CONFIG_FILE: &str = "idlerun.toml";

/// Seconds between idle samples unless configured otherwise.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Idle percentage above which the command runs, unless configured otherwise.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 90.0;

/// What happens to the supervised command when the processor stops being
/// idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationMode {
    /// Send TERM and let the command wind down (default).
    Terminate,
    /// Send KILL.
    Kill,
    /// Send STOP, then CONT once the processor goes idle again.
    Suspend,
}

impl TerminationMode {
    /// Config-file spelling of each mode.
    pub fn parse(value: &str) -> Option<TerminationMode> {
        match value {
            "terminate" => Some(TerminationMode::Terminate),
            "kill" => Some(TerminationMode::Kill),
            "suspend" => Some(TerminationMode::Suspend),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationMode::Terminate => "terminate",
            TerminationMode::Kill => "kill",
            TerminationMode::Suspend => "suspend",
        }
    }

    /// Mode from the command-line flags. Suspend is exclusive (the CLI
    /// rejects combinations with it); kill wins when kill and term are both
    /// given. None means no flag was passed.
    pub fn from_flags(kill: bool, term: bool, suspend: bool) -> Option<TerminationMode> {
        if suspend {
            Some(TerminationMode::Suspend)
        } else if kill {
            Some(TerminationMode::Kill)
        } else if term {
            Some(TerminationMode::Terminate)
        } else {
            None
        }
    }
}

/// Optional settings file. Every key may be omitted; command-line values
/// override whatever is set here.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct FileConfig {
    pub interval: Option<u64>,
    pub threshold: Option<f64>,
    pub mode: Option<String>,
    pub verbose: Option<bool>,
}

/// Errors while loading or validating settings.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Settings file is not valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The polling interval cannot be zero.
    InvalidInterval { value: u64 },
    /// Mode string is not one of terminate/kill/suspend.
    InvalidMode { value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid settings file {}: {}", path.display(), source)
            }
            ConfigError::InvalidInterval { value } => {
                write!(f, "polling interval must be at least 1 second, got {}", value)
            }
            ConfigError::InvalidMode { value } => {
                write!(
                    f,
                    "unknown mode {:?}, expected terminate, kill or suspend",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Load an explicitly named settings file.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the default settings file. Absence reads as empty settings.
pub fn load_default_file() -> Result<FileConfig, ConfigError> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    load_file(path)
}

/// Fully validated runtime settings. Immutable once the loop starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between idle samples.
    pub interval_secs: u64,
    /// Idle percentage above which the command should run.
    pub threshold_percent: f64,
    pub mode: TerminationMode,
    pub verbose: bool,
    /// Resolved absolute path of the supervised command.
    pub command: PathBuf,
    /// Full argument vector; args[0] is the resolved command path.
    pub args: Vec<String>,
}

impl Config {
    /// Assemble settings with standard precedence: built-in defaults, then
    /// the settings file, then command-line values. `command` and `args`
    /// arrive already resolved.
    pub fn assemble(
        file: FileConfig,
        cli_interval: Option<u64>,
        cli_threshold: Option<f64>,
        cli_mode: Option<TerminationMode>,
        cli_verbose: bool,
        command: PathBuf,
        args: Vec<String>,
    ) -> Result<Config, ConfigError> {
        let interval = cli_interval
            .or(file.interval)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval == 0 {
            return Err(ConfigError::InvalidInterval { value: interval });
        }
        let mode = match cli_mode {
            Some(mode) => mode,
            None => match &file.mode {
                Some(value) => TerminationMode::parse(value)
                    .ok_or_else(|| ConfigError::InvalidMode {
                        value: value.clone(),
                    })?,
                None => TerminationMode::Terminate,
            },
        };
        Ok(Config {
            interval_secs: interval,
            threshold_percent: cli_threshold
                .or(file.threshold)
                .unwrap_or(DEFAULT_THRESHOLD_PERCENT),
            mode,
            verbose: cli_verbose || file.verbose.unwrap_or(false),
            command,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(
        file: FileConfig,
        interval: Option<u64>,
        threshold: Option<f64>,
        mode: Option<TerminationMode>,
    ) -> Result<Config, ConfigError> {
        Config::assemble(
            file,
            interval,
            threshold,
            mode,
            false,
            PathBuf::from("/bin/true"),
            vec!["/bin/true".to_string()],
        )
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = assemble(FileConfig::default(), None, None, None).unwrap();
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.threshold_percent, 90.0);
        assert_eq!(config.mode, TerminationMode::Terminate);
        assert!(!config.verbose);
    }

    #[test]
    fn file_settings_override_defaults() {
        let file = FileConfig {
            interval: Some(10),
            threshold: Some(75.5),
            mode: Some("suspend".to_string()),
            verbose: Some(true),
        };
        let config = Config::assemble(
            file,
            None,
            None,
            None,
            false,
            PathBuf::from("/bin/true"),
            vec!["/bin/true".to_string()],
        )
        .unwrap();
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.threshold_percent, 75.5);
        assert_eq!(config.mode, TerminationMode::Suspend);
        assert!(config.verbose);
    }

    #[test]
    fn command_line_overrides_file_settings() {
        let file = FileConfig {
            interval: Some(10),
            threshold: Some(75.5),
            mode: Some("suspend".to_string()),
            verbose: None,
        };
        let config = assemble(file, Some(5), Some(42.0), Some(TerminationMode::Kill)).unwrap();
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.threshold_percent, 42.0);
        assert_eq!(config.mode, TerminationMode::Kill);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = assemble(FileConfig::default(), Some(0), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { value: 0 }));
    }

    #[test]
    fn unknown_mode_string_is_rejected() {
        let file = FileConfig {
            mode: Some("pause".to_string()),
            ..FileConfig::default()
        };
        let err = assemble(file, None, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMode { .. }));
    }

    #[test]
    fn flag_mode_beats_file_mode() {
        let file = FileConfig {
            mode: Some("suspend".to_string()),
            ..FileConfig::default()
        };
        let config = assemble(file, None, None, Some(TerminationMode::Terminate)).unwrap();
        assert_eq!(config.mode, TerminationMode::Terminate);
    }

    #[test]
    fn kill_flag_wins_over_term_flag() {
        assert_eq!(
            TerminationMode::from_flags(true, true, false),
            Some(TerminationMode::Kill)
        );
        assert_eq!(
            TerminationMode::from_flags(false, true, false),
            Some(TerminationMode::Terminate)
        );
        assert_eq!(
            TerminationMode::from_flags(false, false, true),
            Some(TerminationMode::Suspend)
        );
        assert_eq!(TerminationMode::from_flags(false, false, false), None);
    }

    #[test]
    fn mode_spellings_round_trip() {
        for mode in [
            TerminationMode::Terminate,
            TerminationMode::Kill,
            TerminationMode::Suspend,
        ] {
            assert_eq!(TerminationMode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn loads_a_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idlerun.toml");
        std::fs::write(&path, "interval = 10\nthreshold = 75.5\nmode = \"kill\"\n").unwrap();

        let file = load_file(&path).unwrap();
        assert_eq!(file.interval, Some(10));
        assert_eq!(file.threshold, Some(75.5));
        assert_eq!(file.mode.as_deref(), Some("kill"));
        assert_eq!(file.verbose, None);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idlerun.toml");
        std::fs::write(&path, "interval = [not toml").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
