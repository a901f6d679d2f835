//! Terminal rendering of unit failures.
//!
//! A rendered failure names the offending file, lists what was found
//! against what was expected, and ends with numbered fixes.

use std::path::PathBuf;

/// Fix hints shared between commands.
pub mod suggestions {
    pub const NO_MANIFEST: &str = "Create a Pch.toml with a [pch] boundary and [[unit]] entries";

    pub const CHECK_BOUNDARY: &str =
        "Check that `boundary` in Pch.toml names the header your sources include";

    pub const BUILD_FAILED: &str = "Run `harbour-pch build --verbose` for more details";

    /// The artifact store misbehaved.
    pub const CACHE_CLEAR: &str = "Run `harbour-pch cache clear` to discard cached artifacts";
}

/// An error report for one unit or command.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    message: String,
    location: Option<PathBuf>,
    context: Vec<String>,
    suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            location: None,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add a `= ...` detail line.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Name the file the problem was found in. The first location wins.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location.get_or_insert_with(|| path.into());
        self
    }

    /// Render for a terminal, with ANSI colors if `color` is set.
    pub fn format(&self, color: bool) -> String {
        let (error, help) = if color {
            ("\x1b[1;31merror\x1b[0m", "\x1b[1;32mhelp\x1b[0m")
        } else {
            ("error", "help")
        };

        let mut output = format!("{}: {}\n", error, self.message);
        if let Some(path) = &self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }
        for line in &self.context {
            output.push_str(&format!("  = {}\n", line));
        }
        if !self.suggestions.is_empty() {
            output.push_str(&format!("\n{}: consider:\n", help));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }
        output
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
