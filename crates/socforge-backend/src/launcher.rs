//! Blocking launch of external tools.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{BackendError, Result};

/// An external command to launch, with its arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

/// Captured output of a successful launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchOutput {
    pub stdout: String,
    pub stderr: String,
}

impl Launcher {
    pub fn new(cmd: &str) -> Self {
        Launcher {
            cmd: cmd.to_string(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Build a launcher from an argument vector whose first entry is the program.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (cmd, args) = argv.split_first()?;
        Some(Launcher::new(cmd).args(args))
    }

    pub fn args<S: AsRef<str>>(mut self, args: &[S]) -> Self {
        self.args.extend(args.iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn cwd(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Run to completion, capturing output.
    ///
    /// A program that cannot be started or exits non-zero fails with
    /// [`BackendError::Launch`] carrying its stderr.
    pub fn run(&self) -> Result<LaunchOutput> {
        debug!(command = %self, "launching");
        let mut command = Command::new(&self.cmd);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let output = command.output().map_err(|e| BackendError::Launch {
            cmd: self.to_string(),
            status: None,
            message: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(BackendError::Launch {
                cmd: self.to_string(),
                status: output.status.code(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(LaunchOutput { stdout, stderr })
    }
}

impl fmt::Display for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cmd)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let output = Launcher::new("sh").args(&["-c", "echo hello"]).run().unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        Launcher::new("sh")
            .args(&["-c", "echo x > marker"])
            .cwd(dir.path())
            .run()
            .unwrap();
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn environment_is_passed() {
        let output = Launcher::new("sh")
            .args(&["-c", "echo $SOCFORGE_TEST_VAR"])
            .env("SOCFORGE_TEST_VAR", "42")
            .run()
            .unwrap();
        assert_eq!(output.stdout.trim(), "42");
    }

    #[test]
    fn non_zero_exit_is_launch_error() {
        let err = Launcher::new("sh").args(&["-c", "echo boom >&2; exit 3"]).run().unwrap_err();
        match err {
            BackendError::Launch { status, message, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_launch_error() {
        let err = Launcher::new("socforge-no-such-program").run().unwrap_err();
        assert!(matches!(err, BackendError::Launch { status: None, .. }));
    }

    #[test]
    fn from_argv_and_display() {
        let argv = vec!["iverilog".to_string(), "-o".to_string(), "sim.vvp".to_string()];
        let launcher = Launcher::from_argv(&argv).unwrap();
        assert_eq!(launcher.to_string(), "iverilog -o sim.vvp");
        assert!(Launcher::from_argv(&[]).is_none());
    }
}
