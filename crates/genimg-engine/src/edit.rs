use std::path::{Path, PathBuf};

use genimg_contracts::{
    Backend, GenError, GenerationIntent, GenerationRequest, ImageHandle, ModelTier,
};

use crate::generator::Generator;

pub const DEFAULT_ADD_POSITION: &str = "center";

/// A prompt template applied to one primary image (or several for
/// `Combine`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    Edit { prompt: String },
    Style { style: String },
    Background { background: String },
    Add { element: String, position: String },
    Remove { element: String },
    Recolor { target: String, color: String },
    Combine { prompt: String },
}

impl EditOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit { .. } => "edit",
            Self::Style { .. } => "style",
            Self::Background { .. } => "background",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Recolor { .. } => "recolor",
            Self::Combine { .. } => "combine",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Self::Edit { prompt } | Self::Combine { prompt } => prompt.clone(),
            Self::Style { style } => format!(
                "Transform this image into the artistic style of {style}. \
                 Preserve the original composition but render all elements in this new style."
            ),
            Self::Background { background } => format!(
                "Keep the main subject exactly the same but change the background to {background}. \
                 Ensure lighting and shadows match naturally."
            ),
            Self::Add { element, position } => format!(
                "Add {element} to the {position} of this image. \
                 Make it look natural and match the lighting and style of the original."
            ),
            Self::Remove { element } => format!(
                "Remove {element} from this image. \
                 Fill in the area naturally to match the surroundings. Keep everything else exactly the same."
            ),
            Self::Recolor { target, color } => format!(
                "Change only the color of {target} to {color}. \
                 Keep everything else in the image exactly the same, preserving the original style, lighting, and composition."
            ),
        }
    }

    pub fn default_tier(&self) -> ModelTier {
        match self {
            Self::Combine { .. } => ModelTier::Pro,
            _ => ModelTier::Flash,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub operation: EditOperation,
    /// Primary image first; the rest are additional references.
    pub images: Vec<ImageHandle>,
    pub tier: Option<ModelTier>,
    /// `None` keeps the input's ratio.
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub thinking: bool,
}

impl EditRequest {
    pub fn new(operation: EditOperation, images: Vec<ImageHandle>) -> Self {
        Self {
            operation,
            images,
            tier: None,
            aspect_ratio: None,
            resolution: None,
            thinking: false,
        }
    }

    fn to_generation_request(&self, name: String) -> Result<GenerationRequest, GenError> {
        if self.images.is_empty() {
            return Err(GenError::Configuration(format!(
                "{} needs at least one input image",
                self.operation.name()
            )));
        }
        let tier = self.tier.unwrap_or_else(|| self.operation.default_tier());
        if tier.backend() != Backend::Native {
            return Err(GenError::Configuration(format!(
                "editing runs on the native backend; '{tier}' is a batch model"
            )));
        }
        Ok(GenerationRequest {
            name,
            backend: Backend::Native,
            tier,
            intent: GenerationIntent {
                aspect_ratio: self.aspect_ratio.clone(),
                resolution: self.resolution.clone(),
                thinking: self.thinking,
                reference_images: self.images.clone(),
                ..GenerationIntent::new(self.operation.prompt())
            },
        })
    }
}

impl Generator {
    /// Applies an edit and writes the result to `output`. Failures propagate.
    pub fn edit(&self, request: &EditRequest, output: &Path) -> Result<Vec<PathBuf>, GenError> {
        let name = output
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.operation.name().to_string());
        let generation = request.to_generation_request(name)?;
        tracing::info!(
            operation = request.operation.name(),
            model = generation.tier.model_id(),
            inputs = request.images.len(),
            "editing image"
        );
        self.generate(&generation, output)
    }
}
