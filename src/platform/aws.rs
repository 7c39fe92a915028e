use crate::configuration::descriptor::AwsConfiguration;
use crate::platform::{DeployError, HostingPlatform, ObjectStore, UploadError};
use aws_sdk_elasticbeanstalk::types::S3Location;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use log::debug;

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Provider name attached to the static credentials from `deploy.json`.
const CREDENTIALS_PROVIDER: &str = "deploy-descriptor";

/// S3 and Elastic Beanstalk clients sharing one region and credential set.
pub struct AwsSession {
    s3: aws_sdk_s3::Client,
    beanstalk: aws_sdk_elasticbeanstalk::Client,
}

impl AwsSession {
    /// Create a session from the `aws` section of the descriptor.
    ///
    /// Credentials are always the static pair from the descriptor; the
    /// environment only contributes settings such as retry and timeouts.
    pub async fn new(config: &AwsConfiguration) -> AwsSession {
        let sdk_config = aws_config::from_env()
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                &config.credentials.access_key,
                &config.credentials.secret_access_key,
                None,
                None,
                CREDENTIALS_PROVIDER,
            ))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        debug!("AWS session created for region {}", config.region);

        AwsSession {
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            beanstalk: aws_sdk_elasticbeanstalk::Client::new(&sdk_config),
        }
    }
}

impl ObjectStore for AwsSession {
    async fn put_archive(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), UploadError> {
        let length = body.len() as i64;

        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::Private)
            .content_type(ARCHIVE_CONTENT_TYPE)
            .content_length(length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| UploadError {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(aws_sdk_s3::Error::from(e)),
            })?;

        Ok(())
    }
}

impl HostingPlatform for AwsSession {
    async fn create_application_version(
        &self,
        application: &str,
        label: &str,
        bucket: &str,
        key: &str,
    ) -> Result<(), DeployError> {
        let bundle = S3Location::builder().s3_bucket(bucket).s3_key(key).build();

        self.beanstalk
            .create_application_version()
            .application_name(application)
            .version_label(label)
            .source_bundle(bundle)
            .send()
            .await
            .map_err(|e| DeployError::RegisterVersion {
                application: application.to_string(),
                label: label.to_string(),
                source: Box::new(aws_sdk_elasticbeanstalk::Error::from(e)),
            })?;

        Ok(())
    }

    async fn update_environment(&self, environment: &str, label: &str) -> Result<(), DeployError> {
        self.beanstalk
            .update_environment()
            .environment_name(environment)
            .version_label(label)
            .send()
            .await
            .map_err(|e| DeployError::UpdateEnvironment {
                environment: environment.to_string(),
                label: label.to_string(),
                source: Box::new(aws_sdk_elasticbeanstalk::Error::from(e)),
            })?;

        Ok(())
    }
}
