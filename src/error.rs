//! Validation finding types shared by every check battery.

/// Severity of a single validation finding.
///
/// `Error` findings block acceptance of the configuration; `Warning`
/// findings describe suspicious but tolerated patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationLevel {
    Error,
    Warning,
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationLevel::Error => write!(f, "ERROR"),
            ValidationLevel::Warning => write!(f, "WARNING"),
        }
    }
}

/// A single self-contained finding. The message names the offending
/// entity by its textual identifier; findings never carry source positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationError {
    pub fn error(message: impl Into<String>) -> Self {
        ValidationError {
            level: ValidationLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        ValidationError {
            level: ValidationLevel::Warning,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Append-only accumulator of findings produced by a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors(Vec::new())
    }

    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    /// Append an `Error`-level finding.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(ValidationError::error(message));
    }

    /// Append a `Warning`-level finding.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(ValidationError::warning(message));
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// All findings that match the given level, in their original order.
    pub fn at_level(&self, level: ValidationLevel) -> ValidationErrors {
        ValidationErrors(
            self.0
                .iter()
                .filter(|e| e.level == level)
                .cloned()
                .collect(),
        )
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|e| e.level == ValidationLevel::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Bare messages joined one per line, used when embedding findings in
    /// an aggregate error.
    pub fn messages(&self) -> String {
        self.0
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        ValidationErrors(iter.into_iter().collect())
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(v: Vec<ValidationError>) -> Self {
        ValidationErrors(v)
    }
}
