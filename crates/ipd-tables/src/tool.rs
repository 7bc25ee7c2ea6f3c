use anyhow::{Context, Result};
use ipd_core::{Error, IpVersion, ToolPair};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The external program pair that dumps and loads a rule set
pub trait RuleTool {
    fn version(&self) -> IpVersion;

    /// Write the complete current rule set to `dest`
    fn dump(&self, dest: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Load `src` without flushing chains it does not mention
    fn restore(&self, src: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// `iptables-save` / `iptables-restore` (or the ip6tables variants)
pub struct IptablesTool {
    version: IpVersion,
    tools: ToolPair,
}

impl IptablesTool {
    pub fn new(version: IpVersion) -> Self {
        Self::with_tools(version, ToolPair::for_version(version))
    }

    pub fn with_tools(version: IpVersion, tools: ToolPair) -> Self {
        Self { version, tools }
    }

    pub fn tools(&self) -> &ToolPair {
        &self.tools
    }
}

impl RuleTool for IptablesTool {
    fn version(&self) -> IpVersion {
        self.version
    }

    async fn dump(&self, dest: &Path) -> Result<()> {
        let program = &self.tools.save;
        tracing::debug!(program = %program, dest = %dest.display(), "dumping rules");

        let output = Command::new(program)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", program))?;

        if !output.status.success() {
            return Err(command_failed(program, output.status.code(), &output.stderr).into());
        }

        tokio::fs::write(dest, &output.stdout)
            .await
            .with_context(|| format!("Failed to write dump to {}", dest.display()))?;

        Ok(())
    }

    async fn restore(&self, src: &Path) -> Result<()> {
        let program = &self.tools.restore;
        tracing::debug!(program = %program, src = %src.display(), "restoring rules");

        let payload = tokio::fs::read(src)
            .await
            .with_context(|| format!("Failed to read {}", src.display()))?;

        let mut child = Command::new(program)
            .arg("-n")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            drop(stdin);
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(command_failed(program, output.status.code(), &output.stderr).into());
        }

        Ok(())
    }
}

fn command_failed(program: &str, exit_code: Option<i32>, stderr: &[u8]) -> Error {
    Error::CommandFailed {
        program: program.to_string(),
        exit_code,
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    }
}
