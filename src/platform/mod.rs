use std::error::Error as StdError;
use thiserror::Error;

pub mod aws;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug)]
#[error("failed to upload {key} to bucket {bucket}: {source}")]
pub struct UploadError {
    pub bucket: String,
    pub key: String,
    #[source]
    pub source: BoxError,
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("failed to register version {label} of application {application}: {source}")]
    RegisterVersion {
        application: String,
        label: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to switch environment {environment} to version {label}: {source}")]
    UpdateEnvironment {
        environment: String,
        label: String,
        #[source]
        source: BoxError,
    },
}

/// Object storage the archive is uploaded to.
pub trait ObjectStore {
    /// Writes `body` as a private `application/zip` object, replacing any
    /// object already stored under `key`.
    async fn put_archive(&self, bucket: &str, key: &str, body: Vec<u8>)
    -> Result<(), UploadError>;
}

/// Application hosting service that runs uploaded versions.
pub trait HostingPlatform {
    async fn create_application_version(
        &self,
        application: &str,
        label: &str,
        bucket: &str,
        key: &str,
    ) -> Result<(), DeployError>;

    async fn update_environment(&self, environment: &str, label: &str)
    -> Result<(), DeployError>;
}
