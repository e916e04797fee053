//! Detached process launcher
//!
//! Spawns user commands (the terminal) fully disowned from the window
//! manager: new session, double fork, home directory as working directory,
//! null standard streams, no inherited descriptors and a zero umask.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use nix::sys::resource::{getrlimit, Resource};
use nix::sys::stat::{umask, Mode};
use nix::unistd::{fork, setsid, ForkResult};
use tracing::{debug, info};

use crate::error::WmError;

/// Descriptor ceiling used when the limit is unlimited
const FALLBACK_MAX_FD: i32 = 1024;

pub trait Launcher {
    /// Start `argv` detached and return immediately.
    fn launch(&self, argv: &[String]) -> Result<(), WmError>;
}

#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    home: PathBuf,
    max_fd: i32,
}

impl DetachedLauncher {
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        let max_fd = match getrlimit(Resource::RLIMIT_NOFILE) {
            Ok((soft, _)) if soft != libc::RLIM_INFINITY => i32::try_from(soft).unwrap_or(FALLBACK_MAX_FD),
            _ => FALLBACK_MAX_FD,
        };
        Self { home, max_fd }
    }
}

impl Default for DetachedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for DetachedLauncher {
    fn launch(&self, argv: &[String]) -> Result<(), WmError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(WmError::Launch {
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        info!("Launching: {}", argv.join(" "));

        let max_fd = self.max_fd;
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.home)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // SAFETY: only async-signal-safe calls between fork and exec.
        unsafe {
            command.pre_exec(move || {
                setsid()?;
                match fork()? {
                    ForkResult::Parent { .. } => libc::_exit(0),
                    ForkResult::Child => {}
                }
                umask(Mode::empty());
                for fd in 3..max_fd {
                    libc::close(fd);
                }
                Ok(())
            });
        }

        let launch_error = |source| WmError::Launch {
            command: program.clone(),
            source,
        };
        let mut intermediate = command.spawn().map_err(launch_error)?;
        // The intermediate exits right after forking; reaping it leaves no zombie
        // and the grandchild is no longer ours.
        let status = intermediate.wait().map_err(launch_error)?;
        debug!("Launcher intermediate for {} exited with {}", program, status);
        Ok(())
    }
}
