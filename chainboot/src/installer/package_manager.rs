//! Package manager collaborator.

use std::io;
use std::path::Path;
use std::sync::Arc;

use super::{InstallStatus, ProcessRunner, SystemProcessRunner};

/// Installs package-format components.
pub trait PackageManager: Send + Sync {
    /// Install `package` with already-expanded `parameters`.
    ///
    /// `progress` receives 0 to 100 while the install runs.
    fn install(
        &self,
        package: &Path,
        parameters: &[String],
        progress: &dyn Fn(u8),
    ) -> io::Result<InstallStatus>;
}

/// Package manager driven through an external command.
///
/// The argument template is split into words; a word equal to `{params}` is
/// replaced by the parameters and `{package}` by the package path.
pub struct CommandPackageManager {
    program: String,
    args_template: String,
    runner: Arc<dyn ProcessRunner>,
}

impl CommandPackageManager {
    pub fn new(program: impl Into<String>, args_template: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args_template: args_template.into(),
            runner: Arc::new(SystemProcessRunner),
        }
    }

    /// Use a different process runner.
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Full argument list for one install.
    pub fn command_args(&self, package: &Path, parameters: &[String]) -> io::Result<Vec<String>> {
        let words = shell_words::split(&self.args_template)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let package = package.to_string_lossy();

        let mut args = Vec::with_capacity(words.len() + parameters.len());
        for word in words {
            if word == "{params}" {
                args.extend(parameters.iter().cloned());
            } else {
                args.push(word.replace("{package}", &package));
            }
        }
        Ok(args)
    }
}

impl PackageManager for CommandPackageManager {
    fn install(
        &self,
        package: &Path,
        parameters: &[String],
        progress: &dyn Fn(u8),
    ) -> io::Result<InstallStatus> {
        let args = self.command_args(package, parameters)?;
        progress(0);
        let code = self.runner.run(Path::new(&self.program), &args)?;
        progress(100);
        Ok(InstallStatus(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::ChildProcess;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    impl ProcessRunner for RecordingRunner {
        fn run(&self, program: &Path, args: &[String]) -> io::Result<i32> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            Ok(3010)
        }

        fn spawn(
            &self,
            _program: &Path,
            _args: &[String],
            _env: &[(String, String)],
        ) -> io::Result<Box<dyn ChildProcess>> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "not used"))
        }
    }

    #[test]
    fn test_command_args() {
        let manager = CommandPackageManager::new("msiexec", "/i {package} {params}");
        let args = manager
            .command_args(
                Path::new("/tmp/stage dir/runtime.msi"),
                &["TARGETDIR=/opt/x".to_string(), "/quiet".to_string()],
            )
            .unwrap();
        assert_eq!(
            args,
            vec!["/i", "/tmp/stage dir/runtime.msi", "TARGETDIR=/opt/x", "/quiet"]
        );
    }

    #[test]
    fn test_install_runs_program() {
        let runner = Arc::new(RecordingRunner::default());
        let manager =
            CommandPackageManager::new("pkgtool", "install {package} {params}").with_runner(runner.clone());

        let seen = Mutex::new(Vec::new());
        let status = manager
            .install(Path::new("/tmp/a.msi"), &["/quiet".to_string()], &|p| {
                seen.lock().unwrap().push(p)
            })
            .unwrap();

        assert!(status.is_success());
        assert!(status.reboot_required());
        assert_eq!(*seen.lock().unwrap(), vec![0, 100]);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("pkgtool"));
        assert_eq!(calls[0].1, vec!["install", "/tmp/a.msi", "/quiet"]);
    }
}
