use beanstalk_deploy::deployment::{Deployment, DeploymentError};
use beanstalk_deploy::platform::aws::AwsSession;
use log::{debug, error, info};
use std::process::ExitCode;

async fn deploy(deployment: &mut Deployment) -> Result<(), DeploymentError> {
    let session = AwsSession::new(deployment.descriptor().aws()).await;
    let mut progress = |name: &str| debug!("adding {name}");

    deployment.run(&session, Some(&mut progress)).await
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(e) => {
            error!("Deployment error: cannot determine working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut deployment = match Deployment::load(root) {
        Ok(deployment) => deployment,
        Err(e) => {
            error!("Deployment error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Deployment error: cannot start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(deploy(&mut deployment)) {
        Ok(()) => {
            let descriptor = deployment.descriptor();
            info!(
                "Deployed {} to AWS Elastic Beanstalk environment {}",
                descriptor.build_version(),
                descriptor.aws().elb.environment_name
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                "Deployment error: {e} (last completed stage: {})",
                deployment.stage()
            );
            ExitCode::FAILURE
        }
    }
}
