use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenError;

/// The two service families a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Multi-turn capable content model (edits, composition, chat).
    #[serde(alias = "nano")]
    Native,
    /// Single-turn text-to-image model producing up to four images per call.
    #[serde(alias = "imagen")]
    Batch,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Batch => "batch",
        }
    }

    pub fn default_tier(self) -> ModelTier {
        match self {
            Self::Native => ModelTier::Flash,
            Self::Batch => ModelTier::Standard,
        }
    }

    pub fn tiers(self) -> &'static [ModelTier] {
        match self {
            Self::Native => &[ModelTier::Flash, ModelTier::Pro],
            Self::Batch => &[
                ModelTier::Standard,
                ModelTier::Ultra,
                ModelTier::Fast,
                ModelTier::Legacy,
            ],
        }
    }

    /// Resolves a user-supplied tier key for this backend, falling back to
    /// the backend default when nothing was requested.
    pub fn resolve_tier(self, requested: Option<&str>) -> Result<ModelTier, GenError> {
        let Some(raw) = requested.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(self.default_tier());
        };
        let lowered = raw.to_ascii_lowercase();
        self.tiers()
            .iter()
            .copied()
            .find(|tier| tier.key() == lowered || tier.model_id() == lowered)
            .ok_or_else(|| {
                let known = self
                    .tiers()
                    .iter()
                    .map(|tier| tier.key())
                    .collect::<Vec<_>>()
                    .join(", ");
                GenError::Configuration(format!(
                    "unknown model '{raw}' for the {} backend; choose from: {known}",
                    self.as_str()
                ))
            })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = GenError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "native" | "nano" => Ok(Self::Native),
            "batch" | "imagen" => Ok(Self::Batch),
            other => Err(GenError::Configuration(format!(
                "unknown backend '{other}'; use 'nano' (native) or 'imagen' (batch)"
            ))),
        }
    }
}

/// A named model variant. Each tier belongs to exactly one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Flash,
    Pro,
    Standard,
    Ultra,
    Fast,
    Legacy,
}

impl ModelTier {
    pub fn backend(self) -> Backend {
        match self {
            Self::Flash | Self::Pro => Backend::Native,
            Self::Standard | Self::Ultra | Self::Fast | Self::Legacy => Backend::Batch,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Flash => "flash",
            Self::Pro => "pro",
            Self::Standard => "standard",
            Self::Ultra => "ultra",
            Self::Fast => "fast",
            Self::Legacy => "legacy",
        }
    }

    pub fn model_id(self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
            Self::Standard => "imagen-4.0-generate-001",
            Self::Ultra => "imagen-4.0-ultra-generate-001",
            Self::Fast => "imagen-4.0-fast-generate-001",
            Self::Legacy => "imagen-3.0-generate-002",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Self::OneK, Self::TwoK, Self::FourK];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = GenError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| GenError::validation("image size", raw.trim(), &["1K", "2K", "4K"]))
    }
}

/// Whether the batch backend may depict people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonPolicy {
    #[default]
    DontAllow,
    AllowAdult,
    AllowAll,
}

impl PersonPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DontAllow => "dont_allow",
            Self::AllowAdult => "allow_adult",
            Self::AllowAll => "allow_all",
        }
    }
}

impl fmt::Display for PersonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonPolicy {
    type Err = GenError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dont_allow" => Ok(Self::DontAllow),
            "allow_adult" => Ok(Self::AllowAdult),
            "allow_all" => Ok(Self::AllowAll),
            _ => Err(GenError::validation(
                "person generation",
                raw.trim(),
                &["dont_allow", "allow_adult", "allow_all"],
            )),
        }
    }
}
