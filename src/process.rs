//! Subprocess runner.
//!
//! Tools are resolved once via `$PATH`, invoked with a literal argv
//! (never a shell), and their output is captured for the caller to
//! inspect. Expressed as a trait so tests can substitute an in-memory
//! double without relinking.

use std::ffi::OsStr;
use std::process::Command as StdCommand;

use crate::Error;

/// Captured result of a subprocess invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub status_success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// The injectable seam between backends and the outside world.
///
/// Environment variables are inherited unchanged by every implementation
/// that actually spawns a process, so that test harnesses can point mock
/// tools at fixture state via env vars.
pub trait ProcessRunner {
    /// Run `program` with `args`, waiting for it to exit. Returns
    /// `Error::Unsupported` if `program` cannot be found on `$PATH`.
    fn run(&self, program: &str, args: &[&str]) -> Result<RunOutput, Error>;
}

/// Default runner: resolves tools on `$PATH` via `which` and spawns them
/// with `std::process::Command`, never through a shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<RunOutput, Error> {
        let resolved = which::which(program).map_err(|_| {
            Error::Unsupported(format!("required tool '{program}' not found on PATH"))
        })?;

        tracing::debug!(
            program,
            args = ?args,
            "invoking external bootloader tool"
        );

        let output = StdCommand::new(&resolved)
            .args(args.iter().map(OsStr::new))
            .output()
            .map_err(|e| Error::backend(render_command(program, args), e.to_string()))?;

        let run_output = RunOutput {
            status_success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !run_output.status_success {
            tracing::warn!(
                program,
                stderr = %run_output.stderr,
                "external bootloader tool exited non-zero"
            );
        }

        Ok(run_output)
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// Runs `program`/`args`, turning a non-zero exit into `Error::BackendError`
/// carrying stderr.
pub fn run_checked(
    runner: &dyn ProcessRunner,
    program: &str,
    args: &[&str],
) -> Result<String, Error> {
    let output = runner.run(program, args)?;
    if !output.status_success {
        return Err(Error::backend(render_command(program, args), output.stderr));
    }
    Ok(output.stdout)
}

#[cfg(any(test, feature = "test"))]
pub mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// An in-memory [`ProcessRunner`] for unit tests that exercise
    /// backend parsing/state logic without spawning a real process.
    ///
    /// Responses are consumed in FIFO order per `(program)` key; calls are
    /// recorded verbatim so a test can assert on the exact invocations a
    /// backend issued (e.g. that `barebox-state --set` batches every
    /// changed field into one call).
    #[derive(Default)]
    pub struct FakeRunner {
        responses: RefCell<VecDeque<RunOutput>>,
        pub calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, stdout: impl Into<String>) {
            self.responses.borrow_mut().push_back(RunOutput {
                status_success: true,
                stdout: stdout.into(),
                stderr: String::new(),
            });
        }

        pub fn push_err(&self, stderr: impl Into<String>) {
            self.responses.borrow_mut().push_back(RunOutput {
                status_success: false,
                stdout: String::new(),
                stderr: stderr.into(),
            });
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<RunOutput, Error> {
            self.calls.borrow_mut().push((
                program.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            ));
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| Error::backend(program, "no fake response queued"))
        }
    }
}
