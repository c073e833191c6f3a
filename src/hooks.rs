//! External scripts run against a cluster's kubeconfig
//!
//! Some end-to-end steps (draining and deleting a node group's nodes) are
//! driven by shell scripts wrapping kubectl. Each script runs with
//! `KUBECONFIG` pointing at a temporary copy of the cluster's credential.
//! Nothing in the readiness engine depends on this module.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::credentials::ClusterCredential;
use crate::error::{Error, Result};

/// Interpreter used for scripts
pub const DEFAULT_INTERPRETER: &str = "/bin/bash";

/// Runs scripts with a credential exported through `KUBECONFIG`
#[derive(Clone, Debug)]
pub struct KubeconfigScript {
    interpreter: PathBuf,
}

impl Default for KubeconfigScript {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
        }
    }
}

impl KubeconfigScript {
    pub fn with_interpreter(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    /// Run one script, returning its stdout
    pub async fn run(&self, credential: &ClusterCredential, script: &Path) -> Result<String> {
        let kubeconfig = write_kubeconfig(credential)?;
        self.run_with(kubeconfig.path(), script).await
    }

    /// Run scripts in order, stopping at the first failure
    ///
    /// All scripts share one temporary kubeconfig, removed on return.
    pub async fn run_all<P>(
        &self,
        credential: &ClusterCredential,
        scripts: &[P],
    ) -> Result<Vec<String>>
    where
        P: AsRef<Path>,
    {
        let kubeconfig = write_kubeconfig(credential)?;
        let mut outputs = Vec::with_capacity(scripts.len());
        for script in scripts {
            outputs.push(self.run_with(kubeconfig.path(), script.as_ref()).await?);
        }
        Ok(outputs)
    }

    async fn run_with(&self, kubeconfig: &Path, script: &Path) -> Result<String> {
        info!(script = %script.display(), "Running kubeconfig script");

        let output = Command::new(&self.interpreter)
            .arg(script)
            .env("KUBECONFIG", kubeconfig)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::ScriptFailed {
                script: script.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(script = %script.display(), output = %stdout, "Script finished");
        Ok(stdout)
    }
}

/// Write the credential's canonical bytes to a `kubeconfig-*.json` temp file
fn write_kubeconfig(credential: &ClusterCredential) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("kubeconfig-")
        .suffix(".json")
        .tempfile()?;
    file.write_all(&credential.to_canonical_bytes()?)?;
    file.flush()?;
    debug!(path = %file.path().display(), "Wrote temporary kubeconfig");
    Ok(file)
}
