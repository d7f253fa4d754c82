use super::tiers::{Backend, ModelTier, PersonPolicy, Resolution};
use crate::error::GenError;

pub const NATIVE_ASPECT_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];
pub const BATCH_ASPECT_RATIOS: &[&str] = &["1:1", "3:4", "4:3", "9:16", "16:9"];

/// Token budget attached whenever thinking is forwarded.
pub const THINKING_BUDGET: u32 = 1024;

/// Static feature set of one (backend, tier) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub backend: Backend,
    pub tier: ModelTier,
    pub aspect_ratios: &'static [&'static str],
    pub resolutions: &'static [Resolution],
    pub thinking: bool,
    pub grounding: bool,
    /// Total input images, the primary subject of an edit included.
    pub max_reference_images: usize,
    pub max_images_per_call: u32,
    pub default_person_policy: Option<PersonPolicy>,
}

impl Capabilities {
    pub fn supports_aspect_ratio(&self, ratio: &str) -> bool {
        self.aspect_ratios.contains(&ratio)
    }

    pub fn supports_resolution(&self, resolution: Resolution) -> bool {
        self.resolutions.contains(&resolution)
    }

    pub fn has_variable_resolution(&self) -> bool {
        !self.resolutions.is_empty()
    }

    pub fn resolution_names(&self) -> Vec<&'static str> {
        self.resolutions.iter().map(|value| value.as_str()).collect()
    }
}

const FLASH: Capabilities = Capabilities {
    backend: Backend::Native,
    tier: ModelTier::Flash,
    aspect_ratios: NATIVE_ASPECT_RATIOS,
    resolutions: &[],
    thinking: false,
    grounding: false,
    max_reference_images: 3,
    max_images_per_call: 1,
    default_person_policy: None,
};

const PRO: Capabilities = Capabilities {
    backend: Backend::Native,
    tier: ModelTier::Pro,
    aspect_ratios: NATIVE_ASPECT_RATIOS,
    resolutions: &[Resolution::OneK, Resolution::TwoK, Resolution::FourK],
    thinking: true,
    grounding: true,
    max_reference_images: 14,
    max_images_per_call: 1,
    default_person_policy: None,
};

const fn batch_tier(tier: ModelTier, resolutions: &'static [Resolution]) -> Capabilities {
    Capabilities {
        backend: Backend::Batch,
        tier,
        aspect_ratios: BATCH_ASPECT_RATIOS,
        resolutions,
        thinking: false,
        grounding: false,
        max_reference_images: 0,
        max_images_per_call: 4,
        default_person_policy: Some(PersonPolicy::DontAllow),
    }
}

const STANDARD: Capabilities = batch_tier(ModelTier::Standard, &[]);
const ULTRA: Capabilities = batch_tier(ModelTier::Ultra, &[Resolution::OneK, Resolution::TwoK]);
const FAST: Capabilities = batch_tier(ModelTier::Fast, &[]);
const LEGACY: Capabilities = batch_tier(ModelTier::Legacy, &[]);

/// Looks up the feature set for a tier on a backend.
///
/// Fails when the tier belongs to the other backend.
pub fn capabilities(backend: Backend, tier: ModelTier) -> Result<&'static Capabilities, GenError> {
    if tier.backend() != backend {
        return Err(GenError::Configuration(format!(
            "model '{tier}' is not available on the {backend} backend"
        )));
    }
    Ok(match tier {
        ModelTier::Flash => &FLASH,
        ModelTier::Pro => &PRO,
        ModelTier::Standard => &STANDARD,
        ModelTier::Ultra => &ULTRA,
        ModelTier::Fast => &FAST,
        ModelTier::Legacy => &LEGACY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tier_resolves_on_its_own_backend() -> Result<(), GenError> {
        for backend in [Backend::Native, Backend::Batch] {
            for tier in backend.tiers() {
                let caps = capabilities(backend, *tier)?;
                assert_eq!(caps.tier, *tier);
                assert_eq!(caps.backend, backend);
            }
        }
        Ok(())
    }

    #[test]
    fn cross_backend_tier_is_a_configuration_error() {
        let err = capabilities(Backend::Batch, ModelTier::Pro).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn only_pro_gates_thinking_grounding_and_4k() -> Result<(), GenError> {
        let pro = capabilities(Backend::Native, ModelTier::Pro)?;
        let flash = capabilities(Backend::Native, ModelTier::Flash)?;
        assert!(pro.thinking && pro.grounding);
        assert!(!flash.thinking && !flash.grounding);
        assert!(pro.supports_resolution(Resolution::FourK));
        assert!(!flash.has_variable_resolution());
        assert_eq!(pro.max_reference_images, 14);
        assert_eq!(flash.max_reference_images, 3);
        Ok(())
    }

    #[test]
    fn batch_tiers_share_the_narrow_aspect_set() -> Result<(), GenError> {
        let standard = capabilities(Backend::Batch, ModelTier::Standard)?;
        assert!(standard.supports_aspect_ratio("16:9"));
        assert!(!standard.supports_aspect_ratio("21:9"));
        assert_eq!(standard.max_images_per_call, 4);
        assert_eq!(standard.default_person_policy, Some(PersonPolicy::DontAllow));
        let ultra = capabilities(Backend::Batch, ModelTier::Ultra)?;
        assert_eq!(ultra.resolution_names(), vec!["1K", "2K"]);
        Ok(())
    }
}
