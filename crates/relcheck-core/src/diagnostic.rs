//! # Diagnostic Model
//!
//! Findings produced by validation rules.
//!
//! A diagnostic carries a severity, a stable numeric code, a headline, an
//! optional detail message kept as template + arguments (so a presentation
//! layer can translate it), and the ordered set of concerned entities.

use crate::EntityId;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// SEVERITY
// =============================================================================

/// Severity of a diagnostic. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Data is broken and should be fixed before upload.
    Error,
    /// Data is suspicious.
    Warning,
    /// Informational finding.
    Other,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Other => "other",
        })
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A message template with positional `{0}`, `{1}` ... placeholders and the
/// arguments to substitute. `''` renders as a single quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Untranslated template.
    pub template: &'static str,
    /// Positional arguments.
    pub args: Vec<String>,
}

impl Message {
    /// Create a message from a template and its arguments.
    #[must_use]
    pub fn new(template: &'static str, args: Vec<String>) -> Self {
        Self { template, args }
    }

    /// Render the template with its arguments substituted.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(pos) = rest.find(['{', '\'']) {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            if let Some(tail) = rest.strip_prefix("''") {
                out.push('\'');
                rest = tail;
                continue;
            }
            if rest.starts_with('\'') {
                out.push('\'');
                rest = &rest[1..];
                continue;
            }
            // Placeholder `{n}`; anything else is copied verbatim.
            let arg = rest.find('}').and_then(|end| {
                rest[1..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.args.get(i))
                    .map(|a| (a, end))
            });
            match arg {
                Some((a, end)) => {
                    out.push_str(a);
                    rest = &rest[end + 1..];
                }
                None => {
                    out.push('{');
                    rest = &rest[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// =============================================================================
// DIAGNOSTIC
// =============================================================================

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Name of the rule that produced the finding.
    pub rule: String,
    /// Severity.
    pub severity: Severity,
    /// Stable numeric code.
    pub code: u32,
    /// Headline message.
    pub message: String,
    /// Optional detail, kept as template + arguments.
    pub description: Option<Message>,
    /// Concerned entities, distinct, in reporting order.
    pub entities: Vec<EntityId>,
}

impl Diagnostic {
    /// Start building a diagnostic.
    #[must_use]
    pub fn builder(rule: &str, severity: Severity, code: u32) -> DiagnosticBuilder {
        DiagnosticBuilder {
            diagnostic: Self {
                rule: rule.to_string(),
                severity,
                code,
                message: String::new(),
                description: None,
                entities: Vec::new(),
            },
        }
    }

    /// Whether this diagnostic concerns at least one of the given entities.
    #[must_use]
    pub fn is_concerned(&self, relevant: &BTreeSet<EntityId>) -> bool {
        self.entities.iter().any(|e| relevant.contains(e))
    }

    /// The concerned entities as a set.
    #[must_use]
    pub fn entity_set(&self) -> BTreeSet<EntityId> {
        self.entities.iter().copied().collect()
    }

    /// Full human-readable text: headline, then the detail if any.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.description {
            Some(d) => format!("{}: {}", self.message, d.render()),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.severity, self.code, self.rule, self.text())?;
        if !self.entities.is_empty() {
            let ids: Vec<String> = self.entities.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", ids.join(", "))?;
        }
        Ok(())
    }
}

/// Builder for [`Diagnostic`].
#[derive(Debug)]
pub struct DiagnosticBuilder {
    diagnostic: Diagnostic,
}

impl DiagnosticBuilder {
    /// Set the headline.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.diagnostic.message = message.into();
        self
    }

    /// Set a group headline plus a detail template and its arguments.
    #[must_use]
    pub fn grouped(
        mut self,
        headline: impl Into<String>,
        template: &'static str,
        args: Vec<String>,
    ) -> Self {
        self.diagnostic.message = headline.into();
        self.diagnostic.description = Some(Message::new(template, args));
        self
    }

    /// Add concerned entities; duplicates are ignored, order is kept.
    #[must_use]
    pub fn entities(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        for id in ids {
            if !self.diagnostic.entities.contains(&id) {
                self.diagnostic.entities.push(id);
            }
        }
        self
    }

    /// Add a single concerned entity.
    #[must_use]
    pub fn entity(self, id: EntityId) -> Self {
        self.entities([id])
    }

    /// Finish the diagnostic.
    #[must_use]
    pub fn build(self) -> Diagnostic {
        self.diagnostic
    }
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Ordered, run-scoped collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with preallocated room.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Keep only diagnostics concerning at least one relevant entity.
    pub fn retain_concerned(&mut self, relevant: &BTreeSet<EntityId>) {
        self.items.retain(|d| d.is_concerned(relevant));
    }

    /// Remove every diagnostic.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of diagnostics with the given severity.
    #[must_use]
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    /// Diagnostics with the given code.
    pub fn with_code(&self, code: u32) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    /// Whether any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.count_severity(Severity::Error) > 0
    }

    /// Consume into a plain vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
