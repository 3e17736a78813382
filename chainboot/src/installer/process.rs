//! Launching child processes.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// A launched process that can be polled for exit.
pub trait ChildProcess: Send {
    /// Operating system process id.
    fn id(&self) -> u32;

    /// Exit code if the process has exited, without blocking.
    ///
    /// A process killed by a signal reports `-1`.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;
}

/// Starts installer and engine processes.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` to completion and return its exit code.
    fn run(&self, program: &Path, args: &[String]) -> io::Result<i32>;

    /// Start `program` without waiting for it.
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> io::Result<Box<dyn ChildProcess>>;
}

/// [`ChildProcess`] over `std::process::Child`.
#[derive(Debug)]
pub struct SystemChild {
    child: Child,
}

impl ChildProcess for SystemChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }
}

/// [`ProcessRunner`] using `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<i32> {
        tracing::debug!(program = %program.display(), ?args, "Running");
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()?;
        Ok(status.code().unwrap_or(-1))
    }

    fn spawn(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> io::Result<Box<dyn ChildProcess>> {
        tracing::debug!(program = %program.display(), ?args, "Spawning");
        let child = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .spawn()?;
        Ok(Box::new(SystemChild { child }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_run_reports_exit_code() {
        let runner = SystemProcessRunner;
        let code = runner
            .run(Path::new("/bin/sh"), &["-c".to_string(), "exit 7".to_string()])
            .unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn test_spawn_passes_environment() {
        let runner = SystemProcessRunner;
        let mut child = runner
            .spawn(
                Path::new("/bin/sh"),
                &["-c".to_string(), "test \"$MARKER\" = yes".to_string()],
                &[("MARKER".to_string(), "yes".to_string())],
            )
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let code = loop {
            if let Some(code) = child.try_wait().unwrap() {
                break code;
            }
            assert!(Instant::now() < deadline, "child did not exit");
            std::thread::sleep(Duration::from_millis(10));
        };
        assert_eq!(code, 0);
    }

    #[test]
    fn test_missing_program_is_error() {
        let runner = SystemProcessRunner;
        assert!(runner
            .run(Path::new("/nonexistent/chainboot-test-binary"), &[])
            .is_err());
    }
}
