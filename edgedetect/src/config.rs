use std::path::PathBuf;

use crate::cli::CliOptions;
use crate::common::Result;
use crate::device::BackendPreference;
use crate::filter::FilterRequest;

pub const BACKEND_ENV: &str = "EDGEDETECT_BACKEND";
pub const LOG_ENV: &str = "EDGEDETECT_LOG";
pub const LOG_DIR_ENV: &str = "EDGEDETECT_LOG_DIR";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Everything one invocation needs, from the command line and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub request: FilterRequest,
    pub timing: bool,
    pub backend: BackendPreference,
}

impl RunConfig {
    pub fn from_env(options: CliOptions) -> Result<Self> {
        Self::with_env(options, |key| std::env::var(key).ok())
    }

    pub fn with_env(options: CliOptions, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match env(BACKEND_ENV) {
            Some(value) => value.parse()?,
            None => BackendPreference::default(),
        };

        Ok(Self {
            input: options.input,
            output: options.output,
            request: options.request,
            timing: options.timing,
            backend,
        })
    }

    /// A `.txt` input names a list of images rather than an image.
    pub fn is_list(&self) -> bool {
        self.input.as_os_str().as_encoded_bytes().ends_with(b".txt")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::with_env(|key| std::env::var(key).ok())
    }

    pub fn with_env(env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            level: env(LOG_ENV)
                .filter(|level| !level.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            dir: env(LOG_DIR_ENV)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        }
    }
}
