use crate::configuration::version::{BuildIdentifier, VcsError};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DESCRIPTOR_FILE: &str = "deploy.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Deserialize, Clone)]
pub struct CredentialsConfiguration {
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretAccessKey")]
    pub secret_access_key: String,
}

impl Debug for CredentialsConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfiguration")
            .field("access_key", &self.access_key)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct S3Configuration {
    pub bucket: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BeanstalkConfiguration {
    #[serde(rename = "applicationName")]
    pub application_name: String,
    #[serde(rename = "environmentName")]
    pub environment_name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AwsConfiguration {
    pub region: String,
    pub credentials: CredentialsConfiguration,
    pub s3: S3Configuration,
    pub elb: BeanstalkConfiguration,
}

/// User-authored contents of `deploy.json`.
#[derive(Deserialize, Debug, Clone)]
pub struct DescriptorFile {
    pub files: Vec<String>,
    pub aws: AwsConfiguration,
    pub branch: String,
}

impl DescriptorFile {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(DESCRIPTOR_FILE);

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let file = serde_json::from_str::<DescriptorFile>(&content).map_err(|source| {
            ConfigError::Parse {
                path: path.clone(),
                source,
            }
        })?;

        file.validate()
            .map_err(|reason| ConfigError::Invalid { path, reason })?;

        Ok(file)
    }

    fn validate(&self) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("'files' must list at least one path".to_string());
        }
        if self.branch.is_empty() {
            return Err("'branch' must not be empty".to_string());
        }
        // The branch name ends up in a filesystem path and in an object key.
        if self.branch.starts_with('/') || self.branch.split('/').any(|part| part == "..") {
            return Err(format!("'branch' {:?} is not a valid branch name", self.branch));
        }

        Ok(())
    }
}

/// Fully resolved deployment descriptor: the file contents plus the build
/// identifier derived from the branch head. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct DeploymentDescriptor {
    root: PathBuf,
    file: DescriptorFile,
    build: BuildIdentifier,
}

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

impl DeploymentDescriptor {
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, DescriptorError> {
        let root = root.into();
        let file = DescriptorFile::load(&root)?;
        let build = BuildIdentifier::resolve(&root, &file.branch)?;

        Ok(Self::new(root, file, build))
    }

    pub fn new(root: PathBuf, file: DescriptorFile, build: BuildIdentifier) -> Self {
        Self { root, file, build }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[String] {
        &self.file.files
    }

    pub fn aws(&self) -> &AwsConfiguration {
        &self.file.aws
    }

    pub fn branch(&self) -> &str {
        &self.file.branch
    }

    pub fn commit_hash(&self) -> &str {
        &self.build.commit_hash
    }

    pub fn build(&self) -> &BuildIdentifier {
        &self.build
    }

    pub fn build_version(&self) -> String {
        self.build.version()
    }

    pub fn build_key(&self) -> String {
        self.build.key()
    }
}
