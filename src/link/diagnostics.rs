use crate::jvm::BinaryName;
use crate::matcher::NameFilter;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Severity {
    /// Advisory; never blocks processing
    Note,
    /// Indicates likely-broken output; blocks unless `-ignorewarnings`
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "Note"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

/// One recorded observation about the class pools
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Internal name of the class the diagnostic is about
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.subject, self.message)
    }
}

/// Collector for linker and checker diagnostics
///
/// `-dontwarn`/`-dontnote` filters are applied at record time: a suppressed
/// diagnostic is never stored and never counts toward the warning total.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    warn_filter: Option<NameFilter>,
    note_filter: Option<NameFilter>,
    warning_count: usize,
    note_count: usize,
}

impl Diagnostics {
    pub fn new(warn_filter: Option<NameFilter>, note_filter: Option<NameFilter>) -> Diagnostics {
        Diagnostics {
            warn_filter,
            note_filter,
            ..Diagnostics::default()
        }
    }

    pub fn note(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        let subject = subject.into();
        if matches!(&self.note_filter, Some(filter) if filter.matches(&subject)) {
            return;
        }
        self.note_count += 1;
        self.diagnostics.push(Diagnostic {
            severity: Severity::Note,
            subject,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        let subject = subject.into();
        if matches!(&self.warn_filter, Some(filter) if filter.matches(&subject)) {
            return;
        }
        self.warning_count += 1;
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            subject,
            message: message.into(),
        });
    }

    /// Warning about `subject` referring to the missing class `target`
    ///
    /// Suppressed when either class name matches the warning filter, so a
    /// '-dontwarn' naming the missing class silences every reference to it.
    pub fn reference_warning(
        &mut self,
        subject: impl Into<String>,
        target: &BinaryName,
        message: impl Into<String>,
    ) {
        if matches!(&self.warn_filter, Some(filter) if filter.matches(target.as_ref())) {
            return;
        }
        self.warning(subject, message);
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn note_count(&self) -> usize {
        self.note_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diagnostics = Diagnostics::new(None, None);
        diagnostics.note("a/A", "unresolved reference");
        diagnostics.warning("a/B", "missing superclass");
        diagnostics.warning("a/C", "missing interface");

        assert_eq!(diagnostics.note_count(), 1);
        assert_eq!(diagnostics.warning_count(), 2);
        assert_eq!(diagnostics.iter().count(), 3);
    }

    #[test]
    fn suppression_happens_at_record_time() {
        let warn_filter = NameFilter::compile(&[String::from("com/sun/**")]).unwrap();
        let mut diagnostics = Diagnostics::new(Some(warn_filter), None);

        diagnostics.warning("com/sun/Internal", "missing superclass");
        assert_eq!(diagnostics.warning_count(), 0);
        assert!(diagnostics.is_empty());

        diagnostics.warning("com/example/App", "missing superclass");
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn note_filter_does_not_touch_warnings() {
        let note_filter = NameFilter::compile(&[String::from("**")]).unwrap();
        let mut diagnostics = Diagnostics::new(None, Some(note_filter));

        diagnostics.note("a/A", "duplicate definition");
        diagnostics.warning("a/A", "missing superclass");

        assert_eq!(diagnostics.note_count(), 0);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn display_format() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            subject: String::from("a/A"),
            message: String::from("can't find superclass b/B"),
        };
        assert_eq!(
            diagnostic.to_string(),
            "Warning: a/A: can't find superclass b/B"
        );
    }
}
