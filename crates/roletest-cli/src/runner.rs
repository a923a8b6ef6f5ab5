//! Runs a role test inside a throwaway container

use crate::playbook::{self, PlaybookArgs, RoleSource, TEST_DIR};
use anyhow::{anyhow, bail, Context, Result};
use futures::{FutureExt, TryStreamExt};
use roletest_config::RolePaths;
use roletest_core::{ContainerManager, ExecEvent};
use roletest_provider::{DaemonClient, ExecOptions, RemoveOptions, StartOptions};
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

/// Everything needed for one test run
#[derive(Debug, Clone)]
pub struct TestPlan {
    pub image: String,
    pub role: RoleSource,
    pub paths: RolePaths,
    pub args: PlaybookArgs,
    pub privileged: bool,
    pub stop_timeout: u32,
}

/// Test the role and return the playbook's exit code.
///
/// Playbook output is copied to `out` as it arrives. The container is
/// removed (with its volumes) however the run ends.
pub async fn run<W>(client: Arc<dyn DaemonClient>, plan: TestPlan, out: W) -> Result<i64>
where
    W: Write + Send + 'static,
{
    let work_dir = tempfile::Builder::new()
        .prefix("ansible-role-test-")
        .tempdir()
        .context("Failed to create work directory")?;
    playbook::write_test_files(work_dir.path(), &plan.role)?;

    let name = format!("role-{}", Uuid::new_v4());
    let binds = playbook::binds(work_dir.path(), &plan.role, &plan.paths);
    let options = playbook::container_options(&plan.image, &name, binds, plan.privileged);
    let exec_options = ExecOptions {
        env: playbook::ansible_env(&plan.paths),
        working_dir: Some(TEST_DIR.to_string()),
        privileged: plan.privileged,
        ..Default::default()
    };
    let install = plan.role.install_command();
    let cmd = playbook::playbook_command(&plan.args);

    tracing::info!("Testing role {} on {}", plan.role.name(), plan.image);

    let exit_code = ContainerManager::new(client)
        .with_stop_timeout(plan.stop_timeout)
        .with_remove_options(RemoveOptions {
            force: true,
            volumes: true,
        })
        .scope(move |mgr| {
            async move {
                let mut out = out;
                let container = mgr.create(&name, options)?;
                container.start(StartOptions::default()).await?;

                if let Some(install) = install {
                    tracing::info!("Installing role: {}", shell_words::join(&install));
                    let result = container.execute(&install, &exec_options).await?;
                    if !result.succeeded() {
                        bail!("Failed to install role:\n{}", result.text().trim_end());
                    }
                }

                tracing::debug!("Running: {}", shell_words::join(&cmd));
                let mut events = container.stream(&cmd, &exec_options).await?;
                let mut exit_code = None;
                while let Some(event) = events.try_next().await? {
                    match event {
                        ExecEvent::Chunk(chunk) => {
                            out.write_all(&chunk)?;
                            out.flush()?;
                        }
                        ExecEvent::Status(status) => exit_code = status.exit_code,
                    }
                }

                exit_code.ok_or_else(|| anyhow!("ansible-playbook finished without an exit code"))
            }
            .boxed()
        })
        .await?;

    drop(work_dir);
    Ok(exit_code)
}
