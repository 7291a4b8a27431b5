// ABOUTME: Configuration types for output handling
// ABOUTME: Selects the record format, where records are written, and what each record includes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::OutputError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_destinations")]
    pub destinations: Vec<OutputDestination>,
    #[serde(default)]
    pub options: OutputOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDestination {
    pub writer_type: String,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputOptions {
    #[serde(default = "default_true")]
    pub include_stage_logs: bool,
    #[serde(default)]
    pub include_payload: bool,
    #[serde(default)]
    pub only_degraded: bool,
    #[serde(default)]
    pub max_response_length: Option<usize>,
    #[serde(default)]
    pub pretty_print: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileWriterConfig {
    pub path: String,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
    #[serde(default)]
    pub append: bool,
}

/// Settings for the per-ticket writer, which writes `<dir>/<ticket_id>.<ext>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDirConfig {
    pub dir: String,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdoutWriterConfig {
    #[serde(default)]
    pub quiet: bool,
}

fn default_format() -> String {
    "pretty".to_string()
}

fn default_destinations() -> Vec<OutputDestination> {
    vec![OutputDestination::new_stdout()]
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            destinations: default_destinations(),
            options: OutputOptions::default(),
        }
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            include_stage_logs: true,
            include_payload: false,
            only_degraded: false,
            max_response_length: None,
            pretty_print: false,
        }
    }
}

impl OutputConfig {
    /// Same settings, written to `path` instead of the configured destinations
    pub fn to_file<S: Into<String>>(mut self, path: S) -> Self {
        self.destinations = vec![OutputDestination::new_file(path)];
        self
    }

    /// Same settings, one file per ticket under `dir`
    pub fn to_ticket_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.destinations = vec![OutputDestination::new_ticket_dir(dir)];
        self
    }

    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = format.into();
        self
    }
}

impl OutputDestination {
    pub fn new_stdout() -> Self {
        Self {
            writer_type: "stdout".to_string(),
            config: HashMap::new(),
        }
    }

    pub fn new_file<S: Into<String>>(path: S) -> Self {
        let mut config = HashMap::new();
        config.insert("path".to_string(), serde_yaml::Value::String(path.into()));

        Self {
            writer_type: "file".to_string(),
            config,
        }
    }

    pub fn new_ticket_dir<S: Into<String>>(dir: S) -> Self {
        let mut config = HashMap::new();
        config.insert("dir".to_string(), serde_yaml::Value::String(dir.into()));

        Self {
            writer_type: "tickets".to_string(),
            config,
        }
    }

    /// Deserialize this destination's writer settings
    pub fn get_config<T>(&self) -> Result<T, OutputError>
    where
        T: serde::de::DeserializeOwned,
    {
        let config_value = serde_yaml::Value::Mapping(
            self.config
                .iter()
                .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
                .collect(),
        );

        serde_yaml::from_value(config_value).map_err(|e| OutputError::InvalidDestination {
            writer_type: self.writer_type.clone(),
            reason: e.to_string(),
        })
    }
}

impl OutputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self) -> Self {
        self.include_payload = true;
        self
    }

    pub fn summary_only(mut self) -> Self {
        self.include_stage_logs = false;
        self.include_payload = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.pretty_print = true;
        self
    }
}
