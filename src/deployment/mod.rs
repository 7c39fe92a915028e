use crate::archive::{ArchiveBuilder, EntryNaming, PackagingError};
use crate::configuration::descriptor::{ConfigError, DeploymentDescriptor, DescriptorError};
use crate::configuration::version::VcsError;
use crate::platform::{DeployError, HostingPlatform, ObjectStore, UploadError};
use log::info;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

/// Progress of a deployment. Stages only move forward; a failed run stays at
/// the last stage it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeploymentStage {
    Init,
    DescriptorLoaded,
    Archived,
    Uploaded,
    VersionRegistered,
    EnvironmentUpdated,
}

impl Display for DeploymentStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeploymentStage::Init => "init",
            DeploymentStage::DescriptorLoaded => "descriptor loaded",
            DeploymentStage::Archived => "archived",
            DeploymentStage::Uploaded => "uploaded",
            DeploymentStage::VersionRegistered => "version registered",
            DeploymentStage::EnvironmentUpdated => "environment updated",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Packaging(#[from] PackagingError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

impl From<DescriptorError> for DeploymentError {
    fn from(value: DescriptorError) -> Self {
        match value {
            DescriptorError::Config(e) => DeploymentError::Config(e),
            DescriptorError::Vcs(e) => DeploymentError::Vcs(e),
        }
    }
}

#[derive(Debug)]
pub struct Deployment {
    descriptor: DeploymentDescriptor,
    naming: EntryNaming,
    stage: DeploymentStage,
}

impl Deployment {
    pub fn new(descriptor: DeploymentDescriptor) -> Self {
        Self {
            descriptor,
            naming: EntryNaming::default(),
            stage: DeploymentStage::DescriptorLoaded,
        }
    }

    /// Loads `deploy.json` and the branch head from `root`.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, DeploymentError> {
        let descriptor = DeploymentDescriptor::load(root)?;
        info!(
            "loaded descriptor for {} (build {})",
            descriptor.aws().elb.application_name,
            descriptor.build_version()
        );

        Ok(Self::new(descriptor))
    }

    pub fn entry_naming(mut self, naming: EntryNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn descriptor(&self) -> &DeploymentDescriptor {
        &self.descriptor
    }

    pub fn stage(&self) -> DeploymentStage {
        self.stage
    }

    /// Archives, uploads, registers and activates the build.
    ///
    /// Stops at the first failure. Nothing is rolled back: an uploaded
    /// archive or a registered but inactive version stays in place, and
    /// [`Deployment::stage`] tells how far the run got.
    pub async fn run<P>(
        &mut self,
        platform: &P,
        progress: Option<&mut dyn FnMut(&str)>,
    ) -> Result<(), DeploymentError>
    where
        P: ObjectStore + HostingPlatform,
    {
        self.stage = DeploymentStage::DescriptorLoaded;

        let descriptor = &self.descriptor;
        let aws = descriptor.aws();
        let version = descriptor.build_version();
        let key = descriptor.build_key();

        let archive = ArchiveBuilder::new(descriptor.root())
            .entry_naming(self.naming)
            .build(descriptor.files(), progress)?;
        info!("archived {} bytes for {}", archive.len(), key);
        self.stage = DeploymentStage::Archived;

        platform.put_archive(&aws.s3.bucket, &key, archive).await?;
        info!("uploaded s3://{}/{}", aws.s3.bucket, key);
        self.stage = DeploymentStage::Uploaded;

        platform
            .create_application_version(&aws.elb.application_name, &version, &aws.s3.bucket, &key)
            .await?;
        info!(
            "registered version {} of application {}",
            version, aws.elb.application_name
        );
        self.stage = DeploymentStage::VersionRegistered;

        platform
            .update_environment(&aws.elb.environment_name, &version)
            .await?;
        info!(
            "environment {} is switching to version {}",
            aws.elb.environment_name, version
        );
        self.stage = DeploymentStage::EnvironmentUpdated;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::descriptor::DESCRIPTOR_FILE;
    use crate::configuration::version::head_ref_path;
    use crate::platform::BoxError;
    use std::cell::RefCell;
    use std::io;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Put { bucket: String, key: String, size: usize },
        Register { application: String, label: String, bucket: String, key: String },
        Update { environment: String, label: String },
    }

    #[derive(Default)]
    struct RecordingPlatform {
        calls: RefCell<Vec<Call>>,
        fail_at: Option<DeploymentStage>,
    }

    impl RecordingPlatform {
        fn failing_at(stage: DeploymentStage) -> Self {
            Self {
                fail_at: Some(stage),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn rejected() -> BoxError {
            Box::new(io::Error::other("rejected"))
        }
    }

    impl ObjectStore for RecordingPlatform {
        async fn put_archive(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
        ) -> Result<(), UploadError> {
            self.calls.borrow_mut().push(Call::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                size: body.len(),
            });
            if self.fail_at == Some(DeploymentStage::Uploaded) {
                return Err(UploadError {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source: Self::rejected(),
                });
            }
            Ok(())
        }
    }

    impl HostingPlatform for RecordingPlatform {
        async fn create_application_version(
            &self,
            application: &str,
            label: &str,
            bucket: &str,
            key: &str,
        ) -> Result<(), DeployError> {
            self.calls.borrow_mut().push(Call::Register {
                application: application.to_string(),
                label: label.to_string(),
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
            if self.fail_at == Some(DeploymentStage::VersionRegistered) {
                return Err(DeployError::RegisterVersion {
                    application: application.to_string(),
                    label: label.to_string(),
                    source: Self::rejected(),
                });
            }
            Ok(())
        }

        async fn update_environment(
            &self,
            environment: &str,
            label: &str,
        ) -> Result<(), DeployError> {
            self.calls.borrow_mut().push(Call::Update {
                environment: environment.to_string(),
                label: label.to_string(),
            });
            if self.fail_at == Some(DeploymentStage::EnvironmentUpdated) {
                return Err(DeployError::UpdateEnvironment {
                    environment: environment.to_string(),
                    label: label.to_string(),
                    source: Self::rejected(),
                });
            }
            Ok(())
        }
    }

    fn project(files: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let descriptor = format!(
            r#"{{
                "files": {files},
                "aws": {{
                    "region": "us-east-1",
                    "credentials": {{ "accessKey": "AKID", "secretAccessKey": "secret" }},
                    "s3": {{ "bucket": "bundles" }},
                    "elb": {{ "applicationName": "api", "environmentName": "api-prod" }}
                }},
                "branch": "master"
            }}"#
        );
        std::fs::write(root.join(DESCRIPTOR_FILE), descriptor).unwrap();
        std::fs::write(root.join("Dockerfile"), "FROM scratch\n").unwrap();

        let head = head_ref_path(root, "master");
        std::fs::create_dir_all(head.parent().unwrap()).unwrap();
        std::fs::write(head, "deadbeef").unwrap();
        dir
    }

    #[tokio::test]
    async fn deploys_in_order_with_build_names() {
        let dir = project(r#"["Dockerfile"]"#);
        let platform = RecordingPlatform::default();

        let mut deployment = Deployment::load(dir.path()).unwrap();
        assert_eq!(deployment.stage(), DeploymentStage::DescriptorLoaded);
        deployment.run(&platform, None).await.unwrap();

        assert_eq!(deployment.stage(), DeploymentStage::EnvironmentUpdated);
        let calls = platform.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(
            &calls[0],
            Call::Put { bucket, key, size } if bucket == "bundles" && key == "master-deadbeef.zip" && *size > 0
        ));
        assert_eq!(
            calls[1],
            Call::Register {
                application: "api".to_string(),
                label: "master-deadbeef".to_string(),
                bucket: "bundles".to_string(),
                key: "master-deadbeef.zip".to_string(),
            }
        );
        assert_eq!(
            calls[2],
            Call::Update {
                environment: "api-prod".to_string(),
                label: "master-deadbeef".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn missing_file_stops_before_upload() {
        let dir = project(r#"["Dockerfile", "Procfile"]"#);
        let platform = RecordingPlatform::default();

        let mut deployment = Deployment::load(dir.path()).unwrap();
        let err = deployment.run(&platform, None).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Packaging(PackagingError::Missing { .. })));
        assert_eq!(deployment.stage(), DeploymentStage::DescriptorLoaded);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_skips_registration() {
        let dir = project(r#"["Dockerfile"]"#);
        let platform = RecordingPlatform::failing_at(DeploymentStage::Uploaded);

        let mut deployment = Deployment::load(dir.path()).unwrap();
        let err = deployment.run(&platform, None).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Upload(_)));
        assert_eq!(deployment.stage(), DeploymentStage::Archived);
        assert_eq!(platform.calls().len(), 1);
    }

    #[tokio::test]
    async fn activation_failure_leaves_version_registered() {
        let dir = project(r#"["Dockerfile"]"#);
        let platform = RecordingPlatform::failing_at(DeploymentStage::EnvironmentUpdated);

        let mut deployment = Deployment::load(dir.path()).unwrap();
        let err = deployment.run(&platform, None).await.unwrap_err();

        assert!(matches!(
            err,
            DeploymentError::Deploy(DeployError::UpdateEnvironment { .. })
        ));
        assert_eq!(deployment.stage(), DeploymentStage::VersionRegistered);
        assert_eq!(platform.calls().len(), 3);
    }

    #[tokio::test]
    async fn registration_failure_skips_activation() {
        let dir = project(r#"["Dockerfile"]"#);
        let platform = RecordingPlatform::failing_at(DeploymentStage::VersionRegistered);

        let mut deployment = Deployment::load(dir.path()).unwrap();
        let err = deployment.run(&platform, None).await.unwrap_err();

        assert!(matches!(
            err,
            DeploymentError::Deploy(DeployError::RegisterVersion { .. })
        ));
        assert_eq!(deployment.stage(), DeploymentStage::Uploaded);
        assert_eq!(platform.calls().len(), 2);
    }

    #[tokio::test]
    async fn progress_reports_archived_entries() {
        let dir = project(r#"["Dockerfile"]"#);
        let platform = RecordingPlatform::default();

        let mut seen = Vec::new();
        let mut record = |name: &str| seen.push(name.to_string());
        let mut deployment = Deployment::load(dir.path()).unwrap();
        deployment.run(&platform, Some(&mut record)).await.unwrap();

        assert_eq!(seen, ["Dockerfile"]);
    }

    #[test]
    fn unknown_branch_surfaces_vcs_error() {
        let dir = project(r#"["Dockerfile"]"#);
        std::fs::remove_file(head_ref_path(dir.path(), "master")).unwrap();

        let err = Deployment::load(dir.path()).err().unwrap();
        assert!(matches!(err, DeploymentError::Vcs(_)));
    }

    #[test]
    fn stages_are_ordered() {
        assert!(DeploymentStage::Init < DeploymentStage::DescriptorLoaded);
        assert!(DeploymentStage::Uploaded < DeploymentStage::VersionRegistered);
        assert_eq!(DeploymentStage::VersionRegistered.to_string(), "version registered");
    }
}
