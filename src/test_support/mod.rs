//! Test utilities and mocks for harbour-pch unit tests.
//!
//! Mock implementations of the collaborators the coordinator drives: an
//! in-memory include scanner, a counting compiler and misbehaving stores.

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::builder::compiler::{CompileBudget, Compiler};
use crate::builder::errors::{CompileError, ScanError};
use crate::builder::scanner::IncludeScanner;
use crate::core::artifact::{Fingerprint, ObjectArtifact, PchArtifact};
use crate::core::header::HeaderId;
use crate::core::unit::{CompileFlags, TranslationUnit};
use crate::store::{ArtifactStore, MemoryStore, StoreError};

// Re-export fixtures for convenience
pub use fixtures::*;

/// In-memory include scanner.
///
/// Includes resolve to a [`HeaderId`] equal to the include text; nested
/// includes are declared with [`MockIncludeScanner::with_nested`].
#[derive(Debug, Default)]
pub struct MockIncludeScanner {
    headers: HashMap<HeaderId, Vec<u8>>,
    nested: HashMap<HeaderId, Vec<HeaderId>>,
    unreadable: HashSet<HeaderId>,
    reads: AtomicUsize,
}

impl MockIncludeScanner {
    pub fn new() -> Self {
        MockIncludeScanner::default()
    }

    /// Add or replace a header's content.
    pub fn with_header(mut self, id: &str, content: &str) -> Self {
        self.headers.insert(HeaderId::new(id), content.as_bytes().to_vec());
        self
    }

    /// Declare headers included by `id`, in order.
    pub fn with_nested(mut self, id: &str, children: &[&str]) -> Self {
        self.nested.insert(
            HeaderId::new(id),
            children.iter().map(|c| HeaderId::new(c)).collect(),
        );
        self
    }

    /// Make a known header fail on read.
    pub fn with_unreadable(mut self, id: &str) -> Self {
        self.unreadable.insert(HeaderId::new(id));
        self
    }

    /// Number of `read_content` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn expand(&self, header: &HeaderId, out: &mut Vec<HeaderId>, seen: &mut HashSet<HeaderId>) {
        out.push(header.clone());
        if seen.insert(header.clone()) {
            for child in self.nested.get(header).into_iter().flatten() {
                self.expand(child, out, seen);
            }
        }
    }
}

impl IncludeScanner for MockIncludeScanner {
    fn resolve(&self, unit: &TranslationUnit) -> Result<Vec<HeaderId>, ScanError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for header in self.resolve_direct(unit)? {
            self.expand(&header, &mut out, &mut seen);
        }
        Ok(out)
    }

    fn resolve_direct(&self, unit: &TranslationUnit) -> Result<Vec<HeaderId>, ScanError> {
        unit.includes()
            .iter()
            .map(|include| {
                let header = HeaderId::new(&include.path);
                if self.headers.contains_key(&header) {
                    Ok(header)
                } else {
                    Err(ScanError::NotFound {
                        include: include.path.clone(),
                        included_from: unit.source().to_path_buf(),
                    })
                }
            })
            .collect()
    }

    fn read_content(&self, header: &HeaderId) -> Result<Vec<u8>, ScanError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let error = if self.unreadable.contains(header) {
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied")
        } else if let Some(content) = self.headers.get(header) {
            return Ok(content.clone());
        } else {
            io::Error::new(io::ErrorKind::NotFound, "no such header")
        };
        Err(ScanError::Read {
            path: header.as_path().to_path_buf(),
            source: error,
        })
    }
}

/// Compiler that records calls instead of running anything.
#[derive(Debug, Default)]
pub struct MockCompiler {
    stable_calls: AtomicUsize,
    unstable_calls: AtomicUsize,
    delay: Duration,
    fail_stable: Option<String>,
    fail_unstable: Option<String>,
    last_pch: Mutex<Option<String>>,
}

impl MockCompiler {
    pub fn new() -> Self {
        MockCompiler::default()
    }

    /// Make every stable compile take this long (while honouring the budget).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_stable(mut self, diagnostic: &str) -> Self {
        self.fail_stable = Some(diagnostic.to_string());
        self
    }

    pub fn failing_unstable(mut self, diagnostic: &str) -> Self {
        self.fail_unstable = Some(diagnostic.to_string());
        self
    }

    pub fn stable_calls(&self) -> usize {
        self.stable_calls.load(Ordering::SeqCst)
    }

    pub fn unstable_calls(&self) -> usize {
        self.unstable_calls.load(Ordering::SeqCst)
    }

    /// Checksum of the artifact passed to the last unstable compile.
    pub fn last_pch_checksum(&self) -> Option<String> {
        self.last_pch.lock().clone()
    }

    fn wait(&self, budget: &CompileBudget) -> Result<(), CompileError> {
        let until = Instant::now() + self.delay;
        loop {
            budget.check()?;
            if Instant::now() >= until {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Compiler for MockCompiler {
    fn identity(&self) -> String {
        "mock-cc 1.0".to_string()
    }

    fn compile_stable(
        &self,
        headers: &[HeaderId],
        flags: &CompileFlags,
        budget: &CompileBudget,
    ) -> Result<PchArtifact, CompileError> {
        self.stable_calls.fetch_add(1, Ordering::SeqCst);
        self.wait(budget)?;
        if let Some(diagnostic) = &self.fail_stable {
            return Err(CompileError::Rejected {
                diagnostic: diagnostic.clone(),
            });
        }

        let mut data = String::from("PCH");
        for header in headers {
            data.push(' ');
            data.push_str(header.as_str());
        }
        for flag in flags.canonical() {
            data.push(' ');
            data.push_str(flag);
        }
        Ok(PchArtifact::new(data.into_bytes()))
    }

    fn compile_unstable(
        &self,
        _source: &Path,
        pch: &PchArtifact,
        _flags: &CompileFlags,
        output: &Path,
        budget: &CompileBudget,
    ) -> Result<ObjectArtifact, CompileError> {
        self.unstable_calls.fetch_add(1, Ordering::SeqCst);
        budget.check()?;
        *self.last_pch.lock() = Some(pch.checksum().to_string());
        if let Some(diagnostic) = &self.fail_unstable {
            return Err(CompileError::Rejected {
                diagnostic: diagnostic.clone(),
            });
        }
        Ok(ObjectArtifact {
            path: output.to_path_buf(),
        })
    }
}

/// Store whose reads always fail, and optionally its writes too.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_writes: bool,
}

impl FailingStore {
    pub fn new() -> Self {
        FailingStore::default()
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl ArtifactStore for FailingStore {
    fn get(&self, _fingerprint: &Fingerprint) -> Result<Option<PchArtifact>, StoreError> {
        Err(StoreError::Unreachable {
            reason: "mock store is down".to_string(),
        })
    }

    fn put_if_absent(&self, fingerprint: &Fingerprint, artifact: &PchArtifact) -> Result<bool, StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unreachable {
                reason: "mock store is read-only".to_string(),
            });
        }
        self.inner.put_if_absent(fingerprint, artifact)
    }

    fn describe(&self) -> String {
        "failing store".to_string()
    }
}

/// Store where another writer always publishes just before us.
#[derive(Debug)]
pub struct LateWriterStore {
    inner: MemoryStore,
    foreign: PchArtifact,
}

impl LateWriterStore {
    pub fn new(foreign: PchArtifact) -> Self {
        LateWriterStore {
            inner: MemoryStore::new(),
            foreign,
        }
    }
}

impl ArtifactStore for LateWriterStore {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<PchArtifact>, StoreError> {
        self.inner.get(fingerprint)
    }

    fn put_if_absent(&self, fingerprint: &Fingerprint, artifact: &PchArtifact) -> Result<bool, StoreError> {
        self.inner.put_if_absent(fingerprint, &self.foreign)?;
        self.inner.put_if_absent(fingerprint, artifact)
    }

    fn describe(&self) -> String {
        "late-writer store".to_string()
    }
}
