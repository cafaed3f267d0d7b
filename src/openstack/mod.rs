//! OpenStack implementation of the backup backend.
//!
//! Talks to the block-storage (Cinder) and compute (Nova) HTTP APIs with a
//! pre-issued token. Session establishment is out of scope: operators supply
//! `OS_AUTH_TOKEN`, `OS_BLOCK_STORAGE_URL`, and `OS_COMPUTE_URL` through the
//! environment or a config file, merged via `ortho-config`.

mod error;
mod types;

use ortho_config::OrthoConfig;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::backend::{
    Backend, BackendFuture, BackupRecord, CreateBackupRequest, ServerInfo, VolumeInfo,
};
use types::{
    BackupEnvelope, BackupListEnvelope, CreateBackupEnvelope, CreateBackupWire, ServerEnvelope,
    VolumeEnvelope,
};

pub use error::OpenStackError;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Backend endpoints and credentials, loaded from `OS_*` variables or
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OS")]
pub struct OpenStackConfig {
    /// Pre-issued authentication token passed on every request.
    pub auth_token: String,
    /// Block-storage service endpoint, including the project scope
    /// (for example `https://cinder.example:8776/v3/<project_id>`).
    pub block_storage_url: String,
    /// Compute service endpoint (for example
    /// `https://nova.example:8774/v2.1`).
    pub compute_url: String,
}

impl OpenStackConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Config`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, OpenStackError> {
        Self::load_from_iter([std::ffi::OsString::from("cindersweep")])
            .map_err(|err| OpenStackError::Config(err.to_string()))
    }

    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Config`] naming the first blank field.
    pub fn validate(&self) -> Result<(), OpenStackError> {
        for (value, field, env_var) in [
            (&self.auth_token, "auth_token", "OS_AUTH_TOKEN"),
            (
                &self.block_storage_url,
                "block_storage_url",
                "OS_BLOCK_STORAGE_URL",
            ),
            (&self.compute_url, "compute_url", "OS_COMPUTE_URL"),
        ] {
            if value.trim().is_empty() {
                return Err(OpenStackError::Config(format!(
                    "missing {field}: set {env_var}"
                )));
            }
        }
        Ok(())
    }
}

/// Backend that manages backups through the OpenStack HTTP APIs.
#[derive(Clone, Debug)]
pub struct OpenStackBackend {
    http: reqwest::Client,
    config: OpenStackConfig,
}

impl OpenStackBackend {
    /// Constructs a new backend from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Config`] when the configuration fails
    /// validation.
    pub fn new(config: OpenStackConfig) -> Result<Self, OpenStackError> {
        config.validate()?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
        })
    }

    fn block_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.block_storage_url.trim_end_matches('/'))
    }

    fn compute_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.compute_url.trim_end_matches('/'))
    }

    /// Maps 404 to [`OpenStackError::NotFound`] and any other non-success
    /// status to [`OpenStackError::Api`], returning the response otherwise.
    async fn ensure_success(
        response: Response,
        resource: &'static str,
        id: &str,
    ) -> Result<Response, OpenStackError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(OpenStackError::NotFound {
                resource,
                id: id.to_owned(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OpenStackError::Api {
                status: status.as_u16(),
                resource,
                id: id.to_owned(),
                message,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
        resource: &'static str,
        id: &str,
    ) -> Result<T, OpenStackError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header(AUTH_HEADER, &self.config.auth_token)
            .send()
            .await?;
        Ok(Self::ensure_success(response, resource, id)
            .await?
            .json()
            .await?)
    }
}

impl Backend for OpenStackBackend {
    type Error = OpenStackError;

    fn get_volume<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> BackendFuture<'a, VolumeInfo, Self::Error> {
        Box::pin(async move {
            let envelope: VolumeEnvelope = self
                .get_json(
                    self.block_url(&format!("volumes/{volume_id}")),
                    &[],
                    "volume",
                    volume_id,
                )
                .await?;
            Ok(envelope.volume.into_info())
        })
    }

    fn get_server<'a>(
        &'a self,
        server_id: &'a str,
    ) -> BackendFuture<'a, ServerInfo, Self::Error> {
        Box::pin(async move {
            let envelope: ServerEnvelope = self
                .get_json(
                    self.compute_url(&format!("servers/{server_id}")),
                    &[],
                    "server",
                    server_id,
                )
                .await?;
            Ok(envelope.server.into_info())
        })
    }

    fn create_backup<'a>(
        &'a self,
        request: &'a CreateBackupRequest,
    ) -> BackendFuture<'a, BackupRecord, Self::Error> {
        Box::pin(async move {
            let body = CreateBackupEnvelope {
                backup: CreateBackupWire {
                    volume_id: &request.volume_id,
                    name: &request.name,
                    description: &request.description,
                    force: request.force,
                },
            };
            let response = self
                .http
                .post(self.block_url("backups"))
                .header(AUTH_HEADER, &self.config.auth_token)
                .json(&body)
                .send()
                .await?;
            let envelope: BackupEnvelope =
                Self::ensure_success(response, "backup", &request.volume_id)
                    .await?
                    .json()
                    .await?;
            Ok(envelope.backup.into_record())
        })
    }

    fn get_backup<'a>(
        &'a self,
        backup_id: &'a str,
    ) -> BackendFuture<'a, Option<BackupRecord>, Self::Error> {
        Box::pin(async move {
            let fetched: Result<BackupEnvelope, OpenStackError> = self
                .get_json(
                    self.block_url(&format!("backups/{backup_id}")),
                    &[],
                    "backup",
                    backup_id,
                )
                .await;
            match fetched {
                Ok(envelope) => Ok(Some(envelope.backup.into_record())),
                Err(OpenStackError::NotFound { .. }) => Ok(None),
                Err(other) => Err(other),
            }
        })
    }

    fn list_backups<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> BackendFuture<'a, Vec<BackupRecord>, Self::Error> {
        Box::pin(async move {
            // Newest first, across all projects: backups can be visible in a
            // shared administrative scope.
            let envelope: BackupListEnvelope = self
                .get_json(
                    self.block_url("backups/detail"),
                    &[
                        ("volume_id", volume_id),
                        ("all_tenants", "True"),
                        ("sort", "created_at:desc"),
                    ],
                    "backup",
                    volume_id,
                )
                .await?;
            Ok(envelope
                .backups
                .into_iter()
                .map(types::BackupWire::into_record)
                .collect())
        })
    }

    fn delete_backup<'a>(&'a self, backup_id: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let response = self
                .http
                .delete(self.block_url(&format!("backups/{backup_id}")))
                .header(AUTH_HEADER, &self.config.auth_token)
                .send()
                .await?;
            Self::ensure_success(response, "backup", backup_id).await?;
            Ok(())
        })
    }
}
