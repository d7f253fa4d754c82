use thiserror::Error;

/// Every failure a caller of the generation stack can observe.
///
/// Configuration errors are fatal for the whole operation. Validation and
/// backend errors are fatal for the single request they belong to (and become
/// that item's result inside a batch). `NoImage` and `UnsupportedTier` are
/// session-local and never end an interactive session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid {field} '{value}'; allowed: {}", .allowed.join(", "))]
    Validation {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("{0}")]
    Backend(String),
    #[error("No image to save. Generate an image first.")]
    NoImage,
    #[error("{feature} is only available on tiers that support it (current tier: {tier})")]
    UnsupportedTier { feature: String, tier: String },
    #[error("output error: {0}")]
    Output(String),
}

pub type GenResult<T> = Result<T, GenError>;

impl GenError {
    pub fn validation(field: &str, value: &str, allowed: &[&str]) -> Self {
        Self::Validation {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.iter().map(|item| (*item).to_string()).collect(),
        }
    }

    pub fn unsupported(feature: &str, tier: &str) -> Self {
        Self::UnsupportedTier {
            feature: feature.to_string(),
            tier: tier.to_string(),
        }
    }

    /// Collapses an `anyhow` chain into a single backend error, skipping
    /// repeated causes.
    pub fn from_backend_chain(err: &anyhow::Error) -> Self {
        let mut parts: Vec<String> = Vec::new();
        for cause in err.chain() {
            let text = cause.to_string();
            let trimmed = text.trim();
            if trimmed.is_empty() || parts.last().is_some_and(|last| last == trimmed) {
                continue;
            }
            parts.push(trimmed.to_string());
        }
        if parts.is_empty() {
            return Self::Backend(err.to_string());
        }
        Self::Backend(parts.join(": "))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::NoImage | Self::UnsupportedTier { .. })
    }
}
