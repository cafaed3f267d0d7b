//! Run configuration: the backup plan and the optional report target.
//!
//! The plan lives in a YAML file supplied via `--config`. Backend credentials
//! are configured separately through the environment (see
//! [`crate::openstack::OpenStackConfig`]).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// One volume to process, with its retention depth.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct PlanEntry {
    /// Volume identifier.
    pub id: String,
    /// Number of most-recent backups to keep for this volume.
    pub depth: usize,
}

/// Report target used to email the run summary.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ReportConfig {
    /// Sender address.
    pub mail_from: String,
    /// Recipient address.
    pub mail_to: String,
    /// SMTP relay, `host` or `host:port`.
    pub smtp_server: String,
}

/// Full run configuration loaded from the YAML config file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct RunConfig {
    /// Ordered list of volumes to process in one run.
    pub plan: Vec<PlanEntry>,
    /// Optional report target; absence skips reporting with a warning.
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

impl RunConfig {
    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, the YAML fails
    /// to parse, or validation rejects the contents.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_yml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks semantic constraints the deserialiser cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a volume id is blank or a
    /// retention depth is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.plan {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: String::from("plan entry with blank volume id"),
                });
            }
            if entry.depth == 0 {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "volume {}: retention depth must be a positive integer",
                        entry.id
                    ),
                });
            }
        }
        if let Some(report) = &self.report {
            for (value, field) in [
                (&report.mail_from, "mail_from"),
                (&report.mail_to, "mail_to"),
                (&report.smtp_server, "smtp_server"),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        message: format!("report section missing {field}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Errors raised while loading the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path passed on the command line.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid YAML for the expected shape.
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// Path passed on the command line.
        path: String,
        /// Parser error message.
        message: String,
    },
    /// The config file parsed but violates a semantic constraint.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Human-readable description of the violation.
        message: String,
    },
}
