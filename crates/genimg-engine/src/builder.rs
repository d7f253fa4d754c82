use genimg_contracts::capabilities::{capabilities, Capabilities};
use genimg_contracts::jobs::DEFAULT_ASPECT_RATIO;
use genimg_contracts::{
    Backend, GenError, GenerationIntent, ImageHandle, ModelTier, PersonPolicy, Resolution,
};

/// Call settings for the multi-turn content model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCallConfig {
    pub tier: ModelTier,
    pub prompt: String,
    /// `None` leaves the ratio to the model (edits match their input).
    pub aspect_ratio: Option<&'static str>,
    pub resolution: Option<Resolution>,
    pub thinking: bool,
    pub grounding: bool,
    pub with_text: bool,
    pub reference_images: Vec<ImageHandle>,
}

/// Call settings for the text-to-image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCallConfig {
    pub tier: ModelTier,
    pub prompt: String,
    pub aspect_ratio: &'static str,
    pub resolution: Option<Resolution>,
    pub image_count: u32,
    pub person_policy: PersonPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCallConfig {
    Native(NativeCallConfig),
    Batch(BatchCallConfig),
}

impl BackendCallConfig {
    pub fn backend(&self) -> Backend {
        match self {
            Self::Native(_) => Backend::Native,
            Self::Batch(_) => Backend::Batch,
        }
    }

    pub fn model(&self) -> &'static str {
        match self {
            Self::Native(config) => config.tier.model_id(),
            Self::Batch(config) => config.tier.model_id(),
        }
    }
}

/// A validated call plus the soft downgrades applied while building it.
#[derive(Debug, Clone)]
pub struct CallPlan {
    pub config: BackendCallConfig,
    pub warnings: Vec<String>,
}

/// Turns an intent into a backend-specific call configuration.
///
/// Aspect ratio and (on tiers with variable resolution) image size are
/// validated strictly and fail before anything reaches the network. Every
/// other unsupported field is dropped and noted in `CallPlan::warnings`.
pub fn build(
    intent: &GenerationIntent,
    backend: Backend,
    tier: ModelTier,
) -> Result<CallPlan, GenError> {
    let caps = capabilities(backend, tier)?;
    let mut warnings = Vec::new();

    let aspect_ratio = intent
        .aspect_ratio
        .as_deref()
        .map(|raw| resolve_aspect_ratio(raw, caps))
        .transpose()?;
    let resolution = resolve_resolution(intent.resolution.as_deref(), caps, &mut warnings)?;
    let thinking = gate_feature(intent.thinking, caps.thinking, "thinking", tier, &mut warnings);
    let grounding = gate_feature(intent.grounding, caps.grounding, "grounding", tier, &mut warnings);

    let mut reference_images = intent.reference_images.clone();
    if reference_images.len() > caps.max_reference_images {
        push_unique_warning(
            &mut warnings,
            format!(
                "{} accepts at most {} input image(s); dropped {}.",
                tier.model_id(),
                caps.max_reference_images,
                reference_images.len() - caps.max_reference_images
            ),
        );
        reference_images.truncate(caps.max_reference_images);
    }

    let config = match backend {
        Backend::Native => {
            if intent.image_count.is_some_and(|count| count > 1) {
                push_unique_warning(
                    &mut warnings,
                    "native backend produces one image per call; count ignored.".to_string(),
                );
            }
            if intent.person_policy.is_some() {
                push_unique_warning(
                    &mut warnings,
                    "person generation policy applies to the batch backend only; ignored."
                        .to_string(),
                );
            }
            BackendCallConfig::Native(NativeCallConfig {
                tier,
                prompt: intent.prompt.clone(),
                aspect_ratio,
                resolution,
                thinking,
                grounding,
                with_text: intent.with_text,
                reference_images,
            })
        }
        Backend::Batch => {
            let requested = intent.image_count.unwrap_or(1);
            let image_count = requested.clamp(1, caps.max_images_per_call);
            if image_count != requested {
                push_unique_warning(
                    &mut warnings,
                    format!("image count clamped to {image_count}."),
                );
            }
            BackendCallConfig::Batch(BatchCallConfig {
                tier,
                prompt: intent.prompt.clone(),
                aspect_ratio: aspect_ratio.unwrap_or(DEFAULT_ASPECT_RATIO),
                resolution,
                image_count,
                person_policy: intent
                    .person_policy
                    .or(caps.default_person_policy)
                    .unwrap_or_default(),
            })
        }
    };

    for warning in &warnings {
        tracing::debug!(model = tier.model_id(), "{warning}");
    }
    Ok(CallPlan { config, warnings })
}

/// Normalises `16/9` to `16:9` and checks the tier's allowed set.
pub fn resolve_aspect_ratio(raw: &str, caps: &Capabilities) -> Result<&'static str, GenError> {
    let normalized = raw.trim().replace('/', ":");
    caps.aspect_ratios
        .iter()
        .copied()
        .find(|candidate| *candidate == normalized)
        .ok_or_else(|| GenError::validation("aspect ratio", raw.trim(), caps.aspect_ratios))
}

fn resolve_resolution(
    raw: Option<&str>,
    caps: &Capabilities,
    warnings: &mut Vec<String>,
) -> Result<Option<Resolution>, GenError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if !caps.has_variable_resolution() {
        push_unique_warning(
            warnings,
            format!(
                "{} has a fixed resolution; image size '{raw}' ignored.",
                caps.tier.model_id()
            ),
        );
        return Ok(None);
    }
    let allowed = caps.resolution_names();
    let resolution = raw
        .parse::<Resolution>()
        .ok()
        .filter(|value| caps.supports_resolution(*value))
        .ok_or_else(|| GenError::validation("image size", raw, &allowed))?;
    Ok(Some(resolution))
}

fn gate_feature(
    requested: bool,
    supported: bool,
    feature: &str,
    tier: ModelTier,
    warnings: &mut Vec<String>,
) -> bool {
    if requested && !supported {
        push_unique_warning(
            warnings,
            format!("{feature} is not available on the {tier} tier; ignored."),
        );
    }
    requested && supported
}

fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() || warnings.iter().any(|existing| existing == &message) {
        return;
    }
    warnings.push(message);
}
