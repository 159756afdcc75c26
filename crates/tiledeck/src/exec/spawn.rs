//! Detached process launching.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::dispatch::{DispatchError, LaunchPlan};

/// Hands a [`LaunchPlan`] to the operating system.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), DispatchError>;
}

/// Program used to open folders, URLs and shortcuts with the shell handler.
pub fn open_command() -> &'static str {
    if cfg!(windows) {
        "explorer.exe"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Launches detached children with no stdio attached. The server never
/// waits on them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

#[async_trait]
impl Spawner for SystemSpawner {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), DispatchError> {
        let (program, args, cwd) = match plan {
            LaunchPlan::Spawn { program, args, cwd } => {
                (program.as_str(), args.clone(), cwd.as_deref())
            }
            LaunchPlan::Open { target } => (open_command(), vec![target.clone()], None),
        };

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| DispatchError::Spawn {
            program: program.to_string(),
            source,
        })?;
        debug!(pid = ?child.id(), program, "spawned detached process");
        info!(program, args = ?args, "launched");
        Ok(())
    }
}
