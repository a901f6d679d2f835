//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

/// How often a supervised child is polled for exit, deadline and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Why a supervised process was stopped before it exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    TimedOut,
    Cancelled,
}

/// Result of [`ProcessBuilder::exec_supervised`].
#[derive(Debug)]
pub enum Supervised {
    Finished(Output),
    Interrupted(Interrupt),
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Compiler drivers fork cc1/as; a group lets us stop all of them.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn spawn(&self) -> Result<Child> {
        self.build_command()
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let child = self.spawn()?;
        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Execute and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Execute under a deadline, killing the child if the deadline passes or
    /// `should_stop` returns true first.
    ///
    /// Output is drained on helper threads so a chatty child cannot block on
    /// a full pipe while we poll it. On interrupt the child's whole process
    /// group is killed and the drain threads are detached, since grandchildren
    /// may still hold the pipes open.
    pub fn exec_supervised(
        &self,
        deadline: Option<Instant>,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<Supervised> {
        let mut child = self.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        loop {
            let status = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

            if let Some(status) = status {
                return Ok(Supervised::Finished(Output {
                    status,
                    stdout: collect(stdout),
                    stderr: collect(stderr),
                }));
            }

            let interrupt = if should_stop() {
                Some(Interrupt::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(Interrupt::TimedOut)
            } else {
                None
            };

            if let Some(interrupt) = interrupt {
                tracing::debug!("stopping `{}`: {:?}", self.display_command(), interrupt);
                kill_tree(&mut child);
                let _ = child.wait();
                drop(stdout);
                drop(stderr);
                return Ok(Supervised::Interrupted(interrupt));
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Kill the child and everything in its process group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: plain syscall; the group was created by `build_command`.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
    // The child may have exited between try_wait and kill.
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

fn find_from_env_or(var: &str, candidates: &[&str]) -> Option<PathBuf> {
    if let Ok(value) = std::env::var(var) {
        if let Some(path) = find_executable(&value) {
            return Some(path);
        }
    }
    candidates.iter().find_map(|name| find_executable(name))
}

/// Find a C compiler, honouring `CC`.
pub fn find_c_compiler() -> Option<PathBuf> {
    find_from_env_or("CC", &["cc", "gcc", "clang"])
}

/// Find a C++ compiler, honouring `CXX`.
pub fn find_cxx_compiler() -> Option<PathBuf> {
    find_from_env_or("CXX", &["c++", "g++", "clang++"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("gcc").args(["-x", "c-header", "prefix.h", "-o", "prefix.h.gch"]);
        assert_eq!(pb.display_command(), "gcc -x c-header prefix.h -o prefix.h.gch");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_supervised_finishes() {
        let out = ProcessBuilder::new("sh")
            .args(["-c", "echo hello; echo oops >&2"])
            .exec_supervised(None, &|| false)
            .unwrap();
        match out {
            Supervised::Finished(output) => {
                assert!(output.status.success());
                assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
                assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
            }
            other => panic!("expected Finished, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_supervised_times_out() {
        let started = Instant::now();
        let out = ProcessBuilder::new("sleep")
            .arg("5")
            .exec_supervised(Some(Instant::now() + Duration::from_millis(100)), &|| false)
            .unwrap();
        assert!(matches!(out, Supervised::Interrupted(Interrupt::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_supervised_kills_forked_children() {
        // `sh` forks `sleep`, which inherits the output pipes.
        let started = Instant::now();
        let out = ProcessBuilder::new("sh")
            .args(["-c", "sleep 4; echo done"])
            .exec_supervised(Some(Instant::now() + Duration::from_millis(100)), &|| false)
            .unwrap();
        assert!(matches!(out, Supervised::Interrupted(Interrupt::TimedOut)));
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "interrupt waited {:?}",
            started.elapsed()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_supervised_cancelled() {
        let out = ProcessBuilder::new("sleep")
            .arg("5")
            .exec_supervised(None, &|| true)
            .unwrap();
        assert!(matches!(out, Supervised::Interrupted(Interrupt::Cancelled)));
    }
}
