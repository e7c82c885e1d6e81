//! Remote command execution in the Ceph toolbox pod.
//!
//! [`CommandRunner`] is the seam between the harness and the cluster's admin
//! tool: production code runs commands in the `rook-ceph-tools` pod via the
//! Kubernetes exec subprotocol, tests substitute a scripted runner.

use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, ListParams};
use kube::{Api, Client, ResourceExt};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use crate::config::{STATUS_RUNNING, TOOL_APP_LABEL};
use crate::error::{Error, Result};

/// Executes admin commands against the cluster.
///
/// Implementations return the command's stdout; when stdout is empty the
/// stderr text is returned instead (the `ceph auth` family reports through
/// stderr).
pub trait CommandRunner: Send + Sync {
    /// Run `command` and return its output.
    fn run(&self, command: &str) -> impl Future<Output = Result<String>> + Send;
}

/// The `rook-ceph-tools` pod, reached through pod exec.
pub struct Toolbox {
    pods: Api<Pod>,
    pod_name: String,
}

impl Toolbox {
    /// Locate the Running toolbox pod in `namespace`.
    #[instrument(skip(client))]
    pub async fn discover(client: Client, namespace: &str) -> Result<Self> {
        let pods: Api<Pod> = Api::namespaced(client, namespace);
        let list = pods
            .list(&ListParams::default().labels(TOOL_APP_LABEL))
            .await?;

        let pod = list
            .items
            .into_iter()
            .find(|p| {
                p.status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .is_some_and(|phase| phase == STATUS_RUNNING)
            })
            .ok_or_else(|| {
                Error::ResourceNotFound(format!("toolbox pod ({})", TOOL_APP_LABEL))
            })?;

        let pod_name = pod.name_any();
        debug!(pod = %pod_name, "Found toolbox pod");
        Ok(Self { pods, pod_name })
    }

    /// Name of the toolbox pod commands are executed in.
    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }
}

impl CommandRunner for Toolbox {
    async fn run(&self, command: &str) -> Result<String> {
        debug!(pod = %self.pod_name, command, "Executing command in toolbox pod");

        // sh -c preserves quoting inside the command (ceph caps strings).
        let mut attached = self
            .pods
            .exec(
                &self.pod_name,
                ["sh", "-c", command],
                &AttachParams::default().stderr(true),
            )
            .await?;

        let mut stdout = String::new();
        if let Some(mut out) = attached.stdout() {
            out.read_to_string(&mut stdout)
                .await
                .map_err(|e| Error::Exec(format!("reading stdout: {}", e)))?;
        }
        let mut stderr = String::new();
        if let Some(mut err) = attached.stderr() {
            err.read_to_string(&mut stderr)
                .await
                .map_err(|e| Error::Exec(format!("reading stderr: {}", e)))?;
        }
        attached
            .join()
            .await
            .map_err(|e| Error::Exec(format!("command '{}' failed: {}", command, e)))?;

        if stdout.is_empty() {
            Ok(stderr)
        } else {
            Ok(stdout)
        }
    }
}
