//! Boundary-aware PCH builds.
//!
//! A unit's resolved includes are split at the boundary header. Everything
//! before it is compiled once into a precompiled artifact keyed by content
//! fingerprint; everything after it is compiled per unit against that
//! artifact.

pub mod compiler;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod scanner;
pub mod staleness;
pub mod validate;

pub use compiler::{CancelToken, CompileBudget, Compiler, GccCompiler, Language};
pub use coordinator::BoundaryBuildCoordinator;
pub use errors::{BuildError, CompileError, CompilePhase, OrderingViolation, ScanError};
pub use events::{BuildEvent, CollectingSink, EventSink, JsonLinesSink};
pub use executor::BuildExecutor;
pub use fingerprint::{ContentDigests, FingerprintEngine};
pub use scanner::{FsIncludeScanner, IncludeScanner};
pub use staleness::StalenessOracle;
pub use validate::OrderingValidator;
