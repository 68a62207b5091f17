use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{PublishError, ReportPublisher};

/// Commits the report into a local git checkout and optionally pushes it.
pub struct GitPublisher {
    repo_root: PathBuf,
    branch: String,
    push: bool,
}

impl GitPublisher {
    pub fn new(repo_root: PathBuf, branch: String, push: bool) -> Self {
        Self { repo_root, branch, push }
    }

    async fn git(&self, args: &[&str]) -> Result<String, PublishError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|source| PublishError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // git reports "nothing to commit" on stdout
            let detail = if stderr.trim().is_empty() { stdout } else { stderr.into_owned() };
            Err(PublishError::Command {
                command,
                status: output.status.to_string(),
                stderr: detail.trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ReportPublisher for GitPublisher {
    async fn publish(&self, path: &Path, message: &str) -> Result<(), PublishError> {
        // git runs inside repo_root, so relative paths must not be resolved against it
        let absolute = tokio::fs::canonicalize(path).await.unwrap_or_else(|_| path.to_path_buf());
        let target = absolute.to_string_lossy();
        self.git(&["add", target.as_ref()]).await?;

        match self.git(&["commit", "-m", message]).await {
            Ok(_) => tracing::info!("Committed {}", target),
            Err(PublishError::Command { stderr, .. }) if stderr.contains("nothing to commit") => {
                tracing::info!("Report unchanged, nothing to commit");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if self.push {
            self.git(&["push", "origin", &self.branch]).await?;
            tracing::info!("Pushed to origin/{}", self.branch);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "git"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.md");
        std::fs::write(&report, "# report\n").unwrap();

        let publisher = GitPublisher::new(dir.path().to_path_buf(), "main".to_string(), false);
        let result = publisher.publish(&report, "Financial report update").await;

        assert!(matches!(
            result,
            Err(PublishError::Command { .. }) | Err(PublishError::Spawn { .. })
        ));
    }
}
