//! Include scanning.
//!
//! An [`IncludeScanner`] expands a unit's literal includes into the ordered
//! list of headers the compiler will see, and gives access to each
//! header's bytes for fingerprinting.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::builder::errors::ScanError;
use crate::core::header::HeaderId;
use crate::core::unit::{IncludeDirective, IncludeKind, TranslationUnit};
use crate::util::fs::normalize_path;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("valid block comment regex"));

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").expect("valid line comment regex"));

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*(?:"([^"\n]+)"|<([^>\n]+)>)"#)
        .expect("valid include regex")
});

/// Resolves includes and reads header content.
pub trait IncludeScanner: Send + Sync {
    /// Expand a unit's includes, transitively and in inclusion order.
    fn resolve(&self, unit: &TranslationUnit) -> Result<Vec<HeaderId>, ScanError>;

    /// Resolve only the unit's own includes, without expanding them.
    fn resolve_direct(&self, unit: &TranslationUnit) -> Result<Vec<HeaderId>, ScanError>;

    /// Read a resolved header's bytes.
    fn read_content(&self, header: &HeaderId) -> Result<Vec<u8>, ScanError>;
}

/// Extract `#include` directives from C/C++ source text, in order.
///
/// Commented-out includes are ignored. Conditional compilation is not
/// evaluated: every include in the file is reported.
pub fn parse_includes(content: &str) -> Vec<IncludeDirective> {
    let content = BLOCK_COMMENT.replace_all(content, |caps: &regex::Captures<'_>| {
        // Keep line structure so `^` anchors still line up.
        caps[0].chars().filter(|c| *c == '\n').collect::<String>()
    });
    let content = LINE_COMMENT.replace_all(&content, "");

    INCLUDE
        .captures_iter(&content)
        .filter_map(|cap| {
            if let Some(quoted) = cap.get(1) {
                Some(IncludeDirective::quoted(quoted.as_str().trim()))
            } else {
                cap.get(2)
                    .map(|angled| IncludeDirective::angled(angled.as_str().trim()))
            }
        })
        .collect()
}

/// Filesystem-backed scanner.
///
/// Quoted includes are searched in the including file's directory, then in
/// the configured include directories; angled includes only in the include
/// directories. Angled includes that are not found are treated as system
/// headers and left out of the resolved list. Each header's own includes
/// are expanded the first time it is reached; later occurrences are still
/// reported so that the ordering validator sees them.
#[derive(Debug, Clone, Default)]
pub struct FsIncludeScanner {
    include_dirs: Vec<PathBuf>,
}

impl FsIncludeScanner {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        FsIncludeScanner { include_dirs }
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Read a file and extract its literal includes.
    pub fn scan_file(&self, path: &Path) -> Result<Vec<IncludeDirective>, ScanError> {
        let content = std::fs::read(path).map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(parse_includes(&String::from_utf8_lossy(&content)))
    }

    /// Find the file an include refers to.
    pub fn locate(&self, directive: &IncludeDirective, including_file: &Path) -> Option<PathBuf> {
        let local = match directive.kind {
            IncludeKind::Quoted => including_file.parent().map(|dir| dir.join(&directive.path)),
            IncludeKind::Angled => None,
        };

        local
            .into_iter()
            .chain(self.include_dirs.iter().map(|dir| dir.join(&directive.path)))
            .find(|candidate| candidate.is_file())
            .map(|found| normalize_path(&found))
    }

    /// Like [`locate`](Self::locate), but a missing quoted include is an
    /// error and a missing angled one is a system header (`None`).
    fn locate_required(
        &self,
        directive: &IncludeDirective,
        including_file: &Path,
    ) -> Result<Option<PathBuf>, ScanError> {
        match self.locate(directive, including_file) {
            Some(path) => Ok(Some(path)),
            None if directive.kind == IncludeKind::Quoted => Err(ScanError::NotFound {
                include: directive.path.clone(),
                included_from: including_file.to_path_buf(),
            }),
            None => {
                tracing::trace!("skipping system header {}", directive);
                Ok(None)
            }
        }
    }

    fn expand(
        &self,
        directives: &[IncludeDirective],
        including_file: &Path,
        expanded: &mut HashSet<PathBuf>,
        out: &mut Vec<HeaderId>,
    ) -> Result<(), ScanError> {
        for directive in directives {
            let Some(path) = self.locate_required(directive, including_file)? else {
                continue;
            };

            out.push(HeaderId::from_path(&path));

            if expanded.insert(path.clone()) {
                let nested = self.scan_file(&path)?;
                self.expand(&nested, &path, expanded, out)?;
            }
        }
        Ok(())
    }
}

impl IncludeScanner for FsIncludeScanner {
    fn resolve(&self, unit: &TranslationUnit) -> Result<Vec<HeaderId>, ScanError> {
        let mut expanded = HashSet::new();
        let mut out = Vec::new();
        self.expand(unit.includes(), unit.source(), &mut expanded, &mut out)?;
        tracing::trace!("resolved {} header(s) for {}", out.len(), unit.id());
        Ok(out)
    }

    fn resolve_direct(&self, unit: &TranslationUnit) -> Result<Vec<HeaderId>, ScanError> {
        let mut out = Vec::new();
        for directive in unit.includes() {
            if let Some(path) = self.locate_required(directive, unit.source())? {
                out.push(HeaderId::from_path(&path));
            }
        }
        Ok(out)
    }

    fn read_content(&self, header: &HeaderId) -> Result<Vec<u8>, ScanError> {
        std::fs::read(header.as_path()).map_err(|source| ScanError::Read {
            path: header.as_path().to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::core::unit::{BoundaryMarker, CompileFlags};

    #[test]
    fn test_parse_includes() {
        let src = r#"
// MYAPP.CPP : Sample application
#include "another.h"
#include "stable.h"
  #  include <vector>
/* #include "commented.h" */
// #include "also_commented.h"
#include "unstable.h"

int main() { return 0; }
"#;
        let includes = parse_includes(src);
        assert_eq!(
            includes,
            vec![
                IncludeDirective::quoted("another.h"),
                IncludeDirective::quoted("stable.h"),
                IncludeDirective::angled("vector"),
                IncludeDirective::quoted("unstable.h"),
            ]
        );
    }

    #[test]
    fn test_parse_includes_after_multiline_comment() {
        let src = "/* header\n   comment */\n#include \"a.h\"\n";
        assert_eq!(parse_includes(src), vec![IncludeDirective::quoted("a.h")]);
    }

    fn unit_for(source: &Path, scanner: &FsIncludeScanner) -> TranslationUnit {
        TranslationUnit::new(
            source,
            scanner.scan_file(source).unwrap(),
            CompileFlags::default(),
            Arc::new(BoundaryMarker::new("stable.h")),
        )
    }

    #[test]
    fn test_resolve_transitive_in_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("include")).unwrap();
        fs::write(root.join("another.h"), "#include <common.h>\nvoid savetime();\n").unwrap();
        fs::write(root.join("include/common.h"), "#pragma once\n").unwrap();
        fs::write(root.join("stable.h"), "void savemoretime();\n").unwrap();
        fs::write(root.join("unstable.h"), "#include <stdio.h>\nvoid notstable();\n").unwrap();
        fs::write(
            root.join("myapp.cpp"),
            "#include \"another.h\"\n#include \"stable.h\"\n#include \"unstable.h\"\n",
        )
        .unwrap();

        let scanner = FsIncludeScanner::new(vec![root.join("include")]);
        let unit = unit_for(&root.join("myapp.cpp"), &scanner);
        let resolved = scanner.resolve(&unit).unwrap();

        let names: Vec<_> = resolved
            .iter()
            .map(|h| h.as_path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["another.h", "common.h", "stable.h", "unstable.h"]);

        let direct: Vec<_> = scanner
            .resolve_direct(&unit)
            .unwrap()
            .iter()
            .map(|h| h.as_path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(direct, ["another.h", "stable.h", "unstable.h"]);
    }

    #[test]
    fn test_resolve_reports_repeated_includes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("common.h"), "#include \"leaf.h\"\n").unwrap();
        fs::write(root.join("leaf.h"), "").unwrap();
        fs::write(root.join("stable.h"), "#include \"common.h\"\n").unwrap();
        fs::write(root.join("unstable.h"), "#include \"common.h\"\n").unwrap();
        fs::write(
            root.join("main.c"),
            "#include \"stable.h\"\n#include \"unstable.h\"\n",
        )
        .unwrap();

        let scanner = FsIncludeScanner::default();
        let unit = unit_for(&root.join("main.c"), &scanner);
        let resolved = scanner.resolve(&unit).unwrap();

        let common: Vec<_> = resolved.iter().filter(|h| h.matches("common.h")).collect();
        assert_eq!(common.len(), 2);
        // leaf.h is only expanded once
        assert_eq!(resolved.iter().filter(|h| h.matches("leaf.h")).count(), 1);
    }

    #[test]
    fn test_resolve_missing_quoted_include() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("main.c"), "#include \"missing.h\"\n").unwrap();

        let scanner = FsIncludeScanner::default();
        let unit = unit_for(&tmp.path().join("main.c"), &scanner);
        match scanner.resolve(&unit) {
            Err(ScanError::NotFound { include, .. }) => assert_eq!(include, "missing.h"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_read_content_missing_file() {
        let scanner = FsIncludeScanner::default();
        let err = scanner
            .read_content(&HeaderId::new("/definitely/not/here.h"))
            .unwrap_err();
        assert!(matches!(err, ScanError::Read { .. }));
    }
}
