//! Diagnostics sink
//!
//! Every parse, extraction, load and resolution step takes a `&mut
//! Diagnostics` and records what it finds there. Nothing is printed here;
//! the caller decides how to render the records and which exit code to use.

use crate::error::Error;
use crate::location::Location;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub severity: Severity,
    pub message: String,
    /// Whether this record aborted the operation that produced it.
    pub fatal: bool,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: lobster {}: {}", self.location, self.severity, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, location: Location, message: impl Into<String>) {
        self.push(location, Severity::Warning, message.into(), false);
    }

    /// Record a non-fatal error; processing continues.
    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        self.push(location, Severity::Error, message.into(), false);
    }

    /// Record a fatal error and hand it back for propagation.
    pub fn fatal(&mut self, error: Error) -> Error {
        self.push(error.location().clone(), Severity::Error, error.message(), true);
        error
    }

    fn push(&mut self, location: Location, severity: Severity, message: String, fatal: bool) {
        self.records.push(Diagnostic {
            location,
            severity,
            message,
            fatal,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    fn count(&self, severity: Severity) -> usize {
        self.records.iter().filter(|d| d.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }

    pub fn has_fatal(&self) -> bool {
        self.records.iter().any(|d| d.fatal)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FileLocation;
    use std::num::NonZeroU32;

    fn loc(line: u32) -> Location {
        FileLocation::at("lobster.conf", NonZeroU32::new(line).unwrap(), None).into()
    }

    #[test]
    fn records_are_rendered_with_severity() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning(loc(3), "duplicate status draft");
        diagnostics.error(loc(7), "unknown tracing target req foo");

        let rendered: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "lobster.conf:3: lobster warning: duplicate status draft",
                "lobster.conf:7: lobster error: unknown tracing target req foo",
            ]
        );
        assert_eq!(diagnostics.warnings(), 1);
        assert_eq!(diagnostics.errors(), 1);
        assert!(!diagnostics.has_fatal());
    }

    #[test]
    fn fatal_records_and_returns_error() {
        let mut diagnostics = Diagnostics::new();
        let err = diagnostics.fatal(Error::Semantic {
            location: loc(1),
            message: "duplicate declaration of level 'Req'".into(),
        });
        assert!(matches!(err, Error::Semantic { .. }));
        assert!(diagnostics.has_fatal());
        assert_eq!(
            err.to_string(),
            "lobster.conf:1: lobster error: duplicate declaration of level 'Req'"
        );
    }

    #[test]
    fn fatal_record_renders_like_the_error() {
        let mut diagnostics = Diagnostics::new();
        let err = diagnostics.fatal(Error::Lex {
            location: loc(2),
            message: "unterminated string".into(),
        });
        let record = diagnostics.iter().next().unwrap();
        assert!(record.fatal);
        assert_eq!(record.to_string(), err.to_string());
    }
}
