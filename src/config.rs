//! Process-wide configuration, populated once from the environment.

use std::env;
use std::path::PathBuf;

use crate::consts::DEFAULT_GC_THRESHOLD;
use crate::consts::DEFAULT_OUTPUT_DIR;
use crate::error::ConfigError;

/// Where symbolic input bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputSource {
    /// Fully concrete execution; no bytes are ever symbolic.
    None,
    /// Symbolic data comes from standard input.
    #[default]
    Stdin,
    /// Symbolic data is introduced explicitly via `symcc_make_symbolic`.
    Memory,
    /// Symbolic data comes from the named file.
    File(PathBuf),
}

/// Runtime configuration. Set once at startup, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: InputSource,
    /// The directory for storing new outputs.
    pub output_dir: PathBuf,
    /// The file to log constraint solving information to; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Do we prune queries on hot paths, trading completeness for speed?
    pub pruning: bool,
    /// AFL coverage map to initialize with, allowing already covered program
    /// locations to persist across executions.
    pub coverage_map: Option<PathBuf>,
    /// Number of allocated expressions that triggers garbage collection.
    ///
    /// Collecting too often hurts performance, whereas delaying collection
    /// for too long might exhaust memory.
    pub gc_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputSource::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_file: None,
            pruning: false,
            coverage_map: None,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

impl Config {
    /// Populate a configuration from the `SYMCC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = env::var_os("SYMCC_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Some(file) = env::var_os("SYMCC_INPUT_FILE") {
            config.input = InputSource::File(PathBuf::from(file));
        }

        if let Some(flag) = env::var_os("SYMCC_MEMORY_INPUT") {
            if parse_flag("SYMCC_MEMORY_INPUT", &flag.to_string_lossy())? {
                if matches!(config.input, InputSource::File(_)) {
                    return Err(ConfigError::ConflictingInputModes);
                }
                config.input = InputSource::Memory;
            }
        }

        if let Some(flag) = env::var_os("SYMCC_NO_SYMBOLIC_INPUT") {
            if parse_flag("SYMCC_NO_SYMBOLIC_INPUT", &flag.to_string_lossy())? {
                config.input = InputSource::None;
            }
        }

        if let Some(file) = env::var_os("SYMCC_LOG_FILE") {
            config.log_file = Some(PathBuf::from(file));
        }

        if let Some(flag) = env::var_os("SYMCC_ENABLE_LINEARIZATION") {
            config.pruning = parse_flag("SYMCC_ENABLE_LINEARIZATION", &flag.to_string_lossy())?;
        }

        if let Some(map) = env::var_os("SYMCC_AFL_COVERAGE_MAP") {
            config.coverage_map = Some(PathBuf::from(map));
        }

        if let Ok(threshold) = env::var("SYMCC_GC_THRESHOLD") {
            config.gc_threshold =
                threshold
                    .parse()
                    .map_err(|source| ConfigError::InvalidGcThreshold {
                        value: threshold,
                        source,
                    })?;
        }

        Ok(config)
    }
}

/// Interpret a flag variable: `1|on|yes` enable, empty or `0|off|no`
/// disable, anything else is a startup error.
fn parse_flag(variable: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" => Ok(true),
        "" | "0" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::UnknownFlagValue {
            variable: variable.into(),
            value: value.into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        assert!(parse_flag("V", "1").unwrap());
        assert!(parse_flag("V", "on").unwrap());
        assert!(parse_flag("V", "YES").unwrap());
        assert!(!parse_flag("V", "").unwrap());
        assert!(!parse_flag("V", "0").unwrap());
        assert!(!parse_flag("V", "off").unwrap());
        assert!(!parse_flag("V", "no").unwrap());
        assert!(parse_flag("V", "maybe").is_err());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.input, InputSource::Stdin);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/output"));
        assert_eq!(config.gc_threshold, DEFAULT_GC_THRESHOLD);
        assert!(!config.pruning);
    }
}
