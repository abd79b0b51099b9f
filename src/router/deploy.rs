//! Container lifecycle seam
//!
//! Spawning and stopping replica processes is an external concern; the
//! router only depends on this trait. The default implementation drives
//! Docker: each replica runs as a container named `Server{id}` on the
//! cluster network, receiving its numeric id through the `id`
//! environment variable.

use crate::common::utils::server_name;
use crate::common::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait Deployer: Send + Sync {
    async fn spawn_replica(&self, replica_id: i64) -> Result<()>;
    async fn stop_replica(&self, replica_id: i64) -> Result<()>;
}

/// Runs replicas as Docker containers.
pub struct DockerDeployer {
    image: String,
    network: String,
}

impl DockerDeployer {
    pub fn new(image: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            network: network.into(),
        }
    }
}

#[async_trait]
impl Deployer for DockerDeployer {
    async fn spawn_replica(&self, replica_id: i64) -> Result<()> {
        let name = server_name(replica_id);
        let output = Command::new("docker")
            .args([
                "run",
                "--rm",
                "-d",
                "--name",
                &name,
                "--network",
                &self.network,
                "-e",
                &format!("id={}", replica_id),
                &format!("{}:latest", self.image),
            ])
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Internal(format!(
                "failed to start replica {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        tracing::info!("spawned replica container {}", name);
        Ok(())
    }

    async fn stop_replica(&self, replica_id: i64) -> Result<()> {
        let name = server_name(replica_id);
        let output = Command::new("docker").args(["stop", &name]).output().await?;

        if !output.status.success() {
            return Err(Error::Internal(format!(
                "failed to stop replica {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        tracing::info!("stopped replica container {}", name);
        Ok(())
    }
}

/// Deployer for externally-managed fleets and tests: lifecycle calls
/// succeed without side effects.
pub struct NoopDeployer;

#[async_trait]
impl Deployer for NoopDeployer {
    async fn spawn_replica(&self, _replica_id: i64) -> Result<()> {
        Ok(())
    }

    async fn stop_replica(&self, _replica_id: i64) -> Result<()> {
        Ok(())
    }
}
