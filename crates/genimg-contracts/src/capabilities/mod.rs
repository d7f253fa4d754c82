mod table;
mod tiers;

pub use table::{
    capabilities, Capabilities, BATCH_ASPECT_RATIOS, NATIVE_ASPECT_RATIOS, THINKING_BUDGET,
};
pub use tiers::{Backend, ModelTier, PersonPolicy, Resolution};

#[cfg(test)]
mod tests {
    use super::{Backend, ModelTier, PersonPolicy, Resolution};

    #[test]
    fn backend_aliases_parse() {
        assert_eq!("nano".parse::<Backend>().ok(), Some(Backend::Native));
        assert_eq!("IMAGEN".parse::<Backend>().ok(), Some(Backend::Batch));
        assert!("dalle".parse::<Backend>().is_err());
    }

    #[test]
    fn resolve_tier_defaults_per_backend() {
        assert_eq!(Backend::Native.resolve_tier(None).ok(), Some(ModelTier::Flash));
        assert_eq!(Backend::Batch.resolve_tier(Some("")).ok(), Some(ModelTier::Standard));
        assert_eq!(Backend::Native.resolve_tier(Some("PRO")).ok(), Some(ModelTier::Pro));
        assert_eq!(
            Backend::Batch
                .resolve_tier(Some("imagen-4.0-ultra-generate-001"))
                .ok(),
            Some(ModelTier::Ultra)
        );
    }

    #[test]
    fn resolve_tier_rejects_other_backend_keys() {
        let err = Backend::Batch.resolve_tier(Some("pro")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: unknown model 'pro' for the batch backend; choose from: standard, ultra, fast, legacy"
        );
    }

    #[test]
    fn resolution_and_person_policy_parse_loosely() {
        assert_eq!("2k".parse::<Resolution>().ok(), Some(Resolution::TwoK));
        assert!("8K".parse::<Resolution>().is_err());
        assert_eq!(
            " Allow_Adult ".parse::<PersonPolicy>().ok(),
            Some(PersonPolicy::AllowAdult)
        );
    }
}
