//! Compiler abstraction for the two PCH phases.
//!
//! The stable phase turns an ordered header prefix into a precompiled
//! artifact; the unstable phase compiles a source file against it. Every
//! call carries a [`CompileBudget`] so long-running compilers can be timed
//! out or cancelled without publishing anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::builder::errors::CompileError;
use crate::core::artifact::{ObjectArtifact, PchArtifact};
use crate::core::header::HeaderId;
use crate::core::unit::CompileFlags;
use crate::util::fs::ensure_dir;
use crate::util::process::{self, Interrupt, ProcessBuilder, Supervised};

/// Cooperative cancellation flag shared across a build invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Time and cancellation limits for one compiler call.
#[derive(Debug, Clone)]
pub struct CompileBudget {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl CompileBudget {
    /// Start a budget now. `None` means no time limit.
    pub fn start(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        CompileBudget {
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
            cancel,
        }
    }

    pub fn unlimited() -> Self {
        CompileBudget::start(None, CancelToken::new())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn timed_out(&self) -> CompileError {
        CompileError::TimedOut {
            after: self.timeout.unwrap_or_default(),
        }
    }

    /// Fail if the budget is already spent.
    pub fn check(&self) -> Result<(), CompileError> {
        if self.is_cancelled() {
            Err(CompileError::Cancelled)
        } else if self.is_expired() {
            Err(self.timed_out())
        } else {
            Ok(())
        }
    }
}

/// A compiler capable of building and consuming precompiled headers.
pub trait Compiler: Send + Sync {
    /// Identity folded into fingerprints (path and version).
    fn identity(&self) -> String;

    /// Compile the stable prefix into a precompiled artifact.
    ///
    /// `headers` are the unit's own stable includes, in order, ending with
    /// the boundary; headers they include are reached through them.
    fn compile_stable(
        &self,
        headers: &[HeaderId],
        flags: &CompileFlags,
        budget: &CompileBudget,
    ) -> Result<PchArtifact, CompileError>;

    /// Compile a source file using a precompiled artifact.
    fn compile_unstable(
        &self,
        source: &Path,
        pch: &PchArtifact,
        flags: &CompileFlags,
        output: &Path,
        budget: &CompileBudget,
    ) -> Result<ObjectArtifact, CompileError>;
}

/// Source language, which selects the driver and the `-x` header kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// Infer from a `-std=` flag, if any.
    pub fn from_flags(flags: &CompileFlags) -> Option<Language> {
        flags.as_slice().iter().rev().find_map(|flag| {
            let std = flag.strip_prefix("-std=")?;
            if std.starts_with("c++") || std.starts_with("gnu++") {
                Some(Language::Cxx)
            } else if std.starts_with('c') || std.starts_with("gnu") {
                Some(Language::C)
            } else {
                None
            }
        })
    }

    fn header_kind(self) -> &'static str {
        match self {
            Language::C => "c-header",
            Language::Cxx => "c++-header",
        }
    }
}

/// Name of the synthesized prefix header.
const PREFIX_HEADER: &str = "pch-prefix.h";

/// GCC/Clang compiler driven as a subprocess.
///
/// The stable phase writes a prefix header including the unit's direct
/// stable includes in order and compiles it to `<prefix>.gch`. The unstable phase writes the
/// artifact back next to a prefix header and passes `-include <prefix>`, so
/// the compiler picks up the `.gch`.
#[derive(Debug, Clone)]
pub struct GccCompiler {
    cc: PathBuf,
    cxx: PathBuf,
    include_dirs: Vec<PathBuf>,
    work_dir: PathBuf,
    default_language: Language,
    version: String,
}

impl GccCompiler {
    pub fn new(cc: PathBuf, cxx: PathBuf, work_dir: PathBuf) -> Self {
        let version = query_version(&cxx).unwrap_or_default();
        GccCompiler {
            cc,
            cxx,
            include_dirs: Vec::new(),
            work_dir,
            default_language: Language::Cxx,
            version,
        }
    }

    /// Locate compilers from explicit paths, `CC`/`CXX`, or `PATH`.
    pub fn detect(cc: Option<&Path>, cxx: Option<&Path>, work_dir: PathBuf) -> Result<Self> {
        let cc = match cc {
            Some(cc) => cc.to_path_buf(),
            None => process::find_c_compiler().context("no C compiler found (set CC or `pch.cc`)")?,
        };
        let cxx = match cxx {
            Some(cxx) => cxx.to_path_buf(),
            None => process::find_cxx_compiler()
                .context("no C++ compiler found (set CXX or `pch.cxx`)")?,
        };
        tracing::debug!("using compilers {} / {}", cc.display(), cxx.display());
        Ok(GccCompiler::new(cc, cxx, work_dir))
    }

    pub fn with_include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = dirs;
        self
    }

    pub fn with_default_language(mut self, language: Language) -> Self {
        self.default_language = language;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn driver(&self, language: Language) -> &Path {
        match language {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        }
    }

    fn language_for_source(&self, source: &Path, flags: &CompileFlags) -> Language {
        match source.extension().and_then(|e| e.to_str()) {
            Some("c") => Language::C,
            Some("cc" | "cpp" | "cxx" | "c++" | "C") => Language::Cxx,
            _ => Language::from_flags(flags).unwrap_or(self.default_language),
        }
    }

    fn scratch_dir(&self, phase: &str) -> Result<tempfile::TempDir, CompileError> {
        let parent = self.work_dir.join(phase);
        ensure_dir(&parent).map_err(invocation)?;
        tempfile::Builder::new()
            .prefix("pch-")
            .tempdir_in(&parent)
            .map_err(|e| invocation(anyhow::Error::new(e)))
    }

    fn run(&self, cmd: &ProcessBuilder, budget: &CompileBudget) -> Result<(), CompileError> {
        tracing::trace!("running {}", cmd.display_command());
        let cancel = || budget.is_cancelled();
        match cmd.exec_supervised(budget.deadline(), &cancel).map_err(invocation)? {
            Supervised::Finished(output) if output.status.success() => Ok(()),
            Supervised::Finished(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                Err(CompileError::Rejected {
                    diagnostic: if stderr.is_empty() {
                        format!("compiler exited with {:?}", output.status.code())
                    } else {
                        stderr
                    },
                })
            }
            Supervised::Interrupted(Interrupt::TimedOut) => Err(budget.timed_out()),
            Supervised::Interrupted(Interrupt::Cancelled) => Err(CompileError::Cancelled),
        }
    }

    fn include_args(&self) -> impl Iterator<Item = String> + '_ {
        self.include_dirs
            .iter()
            .map(|dir| format!("-I{}", dir.display()))
    }
}

impl Compiler for GccCompiler {
    /// Drivers, version, default language and include directories: all of
    /// them change the stable compile's output.
    fn identity(&self) -> String {
        let mut identity = format!(
            "{} {} {} lang={}",
            self.cc.display(),
            self.cxx.display(),
            self.version,
            self.default_language.header_kind()
        );
        for dir in self.include_args() {
            identity.push(' ');
            identity.push_str(&dir);
        }
        identity
    }

    fn compile_stable(
        &self,
        headers: &[HeaderId],
        flags: &CompileFlags,
        budget: &CompileBudget,
    ) -> Result<PchArtifact, CompileError> {
        budget.check()?;
        let language = Language::from_flags(flags).unwrap_or(self.default_language);
        let scratch = self.scratch_dir("stable")?;
        let prefix = scratch.path().join(PREFIX_HEADER);
        let gch = scratch.path().join(format!("{}.gch", PREFIX_HEADER));

        let mut content = String::new();
        for header in headers {
            content.push_str(&format!("#include \"{}\"\n", header.as_str()));
        }
        fs::write(&prefix, content).map_err(|e| invocation(anyhow::Error::new(e)))?;

        let cmd = ProcessBuilder::new(self.driver(language))
            .args(["-x", language.header_kind()])
            .args(flags.as_slice())
            .args(self.include_args())
            .arg(&prefix)
            .arg("-o")
            .arg(&gch);
        self.run(&cmd, budget)?;

        let data = fs::read(&gch).map_err(|e| CompileError::Invocation {
            message: format!("compiler produced no artifact at {}: {}", gch.display(), e),
        })?;
        Ok(PchArtifact::new(data))
    }

    fn compile_unstable(
        &self,
        source: &Path,
        pch: &PchArtifact,
        flags: &CompileFlags,
        output: &Path,
        budget: &CompileBudget,
    ) -> Result<ObjectArtifact, CompileError> {
        budget.check()?;
        let language = self.language_for_source(source, flags);
        let scratch = self.scratch_dir("unstable")?;
        let prefix = scratch.path().join(PREFIX_HEADER);

        // The stable headers are still included by the source itself, so
        // an empty fallback prefix keeps the build correct if the compiler
        // refuses the artifact.
        fs::write(&prefix, "/* precompiled prefix */\n")
            .map_err(|e| invocation(anyhow::Error::new(e)))?;
        fs::write(scratch.path().join(format!("{}.gch", PREFIX_HEADER)), pch.data())
            .map_err(|e| invocation(anyhow::Error::new(e)))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).map_err(invocation)?;
        }

        let cmd = ProcessBuilder::new(self.driver(language))
            .arg("-c")
            .arg("-Winvalid-pch")
            .args(flags.as_slice())
            .args(self.include_args())
            .arg("-include")
            .arg(&prefix)
            .arg(source)
            .arg("-o")
            .arg(output);
        self.run(&cmd, budget)?;

        Ok(ObjectArtifact {
            path: output.to_path_buf(),
        })
    }
}

fn invocation(err: anyhow::Error) -> CompileError {
    CompileError::Invocation {
        message: format!("{:#}", err),
    }
}

fn query_version(compiler: &Path) -> Option<String> {
    let output = ProcessBuilder::new(compiler)
        .arg("--version")
        .exec_and_check()
        .ok()?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}
