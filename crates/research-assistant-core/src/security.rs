use crate::ResearchError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Resolve `var` through `lookup`, requiring a non-blank value.
///
/// Surrounding whitespace is dropped so a key pasted with a trailing newline
/// still authenticates.
pub fn require_secret<F>(var: &str, lookup: F) -> Result<SecretValue, ResearchError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(SecretValue(value.trim().to_string())),
        _ => Err(ResearchError::MissingSecret(var.to_string())),
    }
}
