//! Fingerprinting of stable prefixes.
//!
//! A fingerprint captures everything that can end up in a precompiled
//! artifact: the boundary, the content of every header up to and including
//! it (in order), the compile flags and the compiler identity. Equal
//! fingerprints mean the artifact can be shared.

use dashmap::DashMap;

use crate::builder::errors::ScanError;
use crate::builder::scanner::IncludeScanner;
use crate::core::artifact::Fingerprint;
use crate::core::header::HeaderId;
use crate::core::unit::{BoundaryMarker, CompileFlags};
use crate::util::hash::{sha256_bytes, HashBuilder};

/// Bump when the fingerprint layout changes so old cache entries miss.
const FINGERPRINT_VERSION: &str = "harbour-pch/1";

const TAG_BOUNDARY: u8 = 1;
const TAG_COMPILER: u8 = 2;
const TAG_HEADERS: u8 = 3;
const TAG_FLAGS: u8 = 4;

/// Per-build memo of header content digests.
///
/// Headers are immutable for the duration of one build invocation, so
/// units sharing a stable prefix only read each header once.
#[derive(Debug, Default)]
pub struct ContentDigests {
    digests: DashMap<HeaderId, String>,
}

impl ContentDigests {
    pub fn new() -> Self {
        ContentDigests::default()
    }

    fn get_or_read(
        &self,
        scanner: &dyn IncludeScanner,
        header: &HeaderId,
    ) -> Result<String, ScanError> {
        if let Some(digest) = self.digests.get(header) {
            return Ok(digest.clone());
        }
        let digest = sha256_bytes(&scanner.read_content(header)?);
        self.digests.insert(header.clone(), digest.clone());
        Ok(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Computes fingerprints by reading headers through an [`IncludeScanner`].
pub struct FingerprintEngine<'a> {
    scanner: &'a dyn IncludeScanner,
    compiler_identity: &'a str,
    digests: Option<&'a ContentDigests>,
}

impl<'a> FingerprintEngine<'a> {
    pub fn new(scanner: &'a dyn IncludeScanner) -> Self {
        FingerprintEngine {
            scanner,
            compiler_identity: "",
            digests: None,
        }
    }

    /// Fold the compiler's identity into every fingerprint.
    pub fn with_compiler_identity(mut self, identity: &'a str) -> Self {
        self.compiler_identity = identity;
        self
    }

    /// Share header digests across computations within one build.
    pub fn with_digest_cache(mut self, digests: &'a ContentDigests) -> Self {
        self.digests = Some(digests);
        self
    }

    /// Fingerprint a stable prefix (boundary included) and its flags.
    ///
    /// Order-sensitive in the prefix, order-insensitive in the flags.
    /// Fails if any header in the prefix cannot be read.
    pub fn compute(
        &self,
        stable_prefix: &[HeaderId],
        boundary: &BoundaryMarker,
        flags: &CompileFlags,
    ) -> Result<Fingerprint, ScanError> {
        let mut hash = HashBuilder::new();
        hash.update_str(FINGERPRINT_VERSION);

        hash.update_tag(TAG_BOUNDARY).update_str(boundary.name());
        hash.update_tag(TAG_COMPILER).update_str(self.compiler_identity);

        hash.update_tag(TAG_HEADERS)
            .update_u64(stable_prefix.len() as u64);
        for header in stable_prefix {
            let digest = match self.digests {
                Some(cache) => cache.get_or_read(self.scanner, header)?,
                None => sha256_bytes(&self.scanner.read_content(header)?),
            };
            hash.update_str(&digest);
        }

        let canonical = flags.canonical();
        hash.update_tag(TAG_FLAGS).update_u64(canonical.len() as u64);
        hash.update_strs(canonical);

        Ok(Fingerprint::from_hex(hash.finish()))
    }
}
