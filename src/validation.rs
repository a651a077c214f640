use std::{collections::BTreeMap, fmt};

use thiserror::Error;

use crate::i18n::{self, Locale};

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Required,
    InvalidEmail,
    NotANumber,
    AgeBelow { min: u8 },
    AgeAbove { max: u8 },
    UnknownGender,
    NoEvents,
    UnknownEvent { tag: String },
    AgreementRequired,
    SignatureRequired,
}

impl Violation {
    /// The message shown next to the offending field.
    #[must_use]
    pub fn message(&self, locale: Locale) -> String {
        match self {
            Self::Required => i18n::lookup(locale, "errors.required").to_string(),
            Self::InvalidEmail => i18n::lookup(locale, "errors.email").to_string(),
            Self::NotANumber => i18n::lookup(locale, "errors.number").to_string(),
            Self::AgeBelow { min } => {
                i18n::format(locale, "errors.age_min", &[("min", min.to_string())])
            }
            Self::AgeAbove { max } => {
                i18n::format(locale, "errors.age_max", &[("max", max.to_string())])
            }
            Self::UnknownGender => i18n::lookup(locale, "errors.gender").to_string(),
            Self::NoEvents => i18n::lookup(locale, "errors.events").to_string(),
            Self::UnknownEvent { tag } => {
                format!("{}: {tag}", i18n::lookup(locale, "errors.unknown_event"))
            }
            Self::AgreementRequired => i18n::lookup(locale, "errors.agreement").to_string(),
            Self::SignatureRequired => i18n::lookup(locale, "errors.signature").to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "is required"),
            Self::InvalidEmail => write!(f, "is not a valid email address"),
            Self::NotANumber => write!(f, "is not a number"),
            Self::AgeBelow { min } => write!(f, "must be at least {min}"),
            Self::AgeAbove { max } => write!(f, "must be at most {max}"),
            Self::UnknownGender => write!(f, "is not one of male, female, other"),
            Self::NoEvents => write!(f, "needs at least one event"),
            Self::UnknownEvent { tag } => write!(f, "contains the unknown event '{tag}'"),
            Self::AgreementRequired => write!(f, "must be accepted"),
            Self::SignatureRequired => write!(f, "must be signed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the field in the submitted form, like `email` or `participants[1].age`.
    pub path: String,
    pub violation: Violation,
}

/// Every field that failed validation in one pass, in the order they were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation: {}", .0.len(), summary(.0))]
pub struct ValidationErrors(Vec<FieldError>);

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{} {}", error.path, error.violation))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, path: impl Into<String>, violation: Violation) {
        self.0.push(FieldError {
            path: path.into(),
            violation,
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// The first violation reported for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Violation> {
        self.0
            .iter()
            .find(|error| error.path == path)
            .map(|error| &error.violation)
    }

    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// `Ok(value)` if nothing was collected, otherwise all collected errors.
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one field failed.
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }

    /// One localized message per field path, ready to be rendered next to the inputs.
    #[must_use]
    pub fn localized(&self, locale: Locale) -> BTreeMap<String, String> {
        let mut messages = BTreeMap::new();
        for error in &self.0 {
            messages
                .entry(error.path.clone())
                .or_insert_with(|| error.violation.message(locale));
        }
        messages
    }
}

/// Joins a field name onto a path prefix, `""` being the top level.
#[must_use]
pub fn field_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}
