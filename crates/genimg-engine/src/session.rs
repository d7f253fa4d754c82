use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use genimg_contracts::capabilities::{capabilities, Capabilities};
use genimg_contracts::request::NO_IMAGE_DETAIL;
use genimg_contracts::{
    Backend, GenError, GenerationIntent, ImageHandle, ModelTier, Resolution,
};
use serde_json::Value;

use crate::adapter::{NativeAdapter, NativeSettings};
use crate::builder::{build, resolve_aspect_ratio, BackendCallConfig};
use crate::output;

pub const IMAGE_MARKER: &str = "[image]";

/// Settings a chat session is (re)built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub tier: ModelTier,
    pub thinking: bool,
    pub aspect_ratio: String,
    pub resolution: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            tier: ModelTier::Flash,
            thinking: false,
            aspect_ratio: "1:1".to_string(),
            resolution: None,
            output_dir: PathBuf::from(output::DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Active => f.write_str("active"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// What one successful `send` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Image { text: Option<String> },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub tier: ModelTier,
    pub thinking: bool,
    pub aspect_ratio: String,
    pub resolution: Option<String>,
    pub images_generated: u32,
    pub has_image: bool,
    pub history_len: usize,
    pub state: SessionState,
}

/// Wire-level turn sequence plus the settings snapshot taken when it was
/// started.
struct Conversation {
    settings: NativeSettings,
    contents: Vec<Value>,
}

impl Conversation {
    fn start(config: &ChatConfig) -> Result<Self, GenError> {
        let intent = GenerationIntent {
            aspect_ratio: Some(config.aspect_ratio.clone()),
            resolution: config.resolution.clone(),
            thinking: config.thinking,
            with_text: true,
            ..GenerationIntent::default()
        };
        let plan = build(&intent, Backend::Native, config.tier)?;
        let BackendCallConfig::Native(native) = plan.config else {
            return Err(GenError::Configuration(
                "chat requires the native backend".to_string(),
            ));
        };
        Ok(Self {
            settings: NativeSettings::from_config(&native),
            contents: Vec::new(),
        })
    }
}

/// Multi-turn refinement over the native backend.
///
/// History, the current image and the conversation handle share one
/// lifecycle: every setting change rebuilds the conversation and drops the
/// other two with it. Only [`ChatSession::clear`] also zeroes the image
/// counter.
pub struct ChatSession {
    config: ChatConfig,
    adapter: Arc<NativeAdapter>,
    conversation: Conversation,
    history: Vec<ChatTurn>,
    current_image: Option<ImageHandle>,
    image_counter: u32,
}

impl ChatSession {
    pub fn new(config: ChatConfig, adapter: Arc<NativeAdapter>) -> Result<Self, GenError> {
        let caps = native_caps(config.tier)?;
        resolve_aspect_ratio(&config.aspect_ratio, caps)?;
        if let Some(raw) = config.resolution.as_deref() {
            check_resolution(raw, caps)?;
        }
        if config.thinking && !caps.thinking {
            return Err(GenError::unsupported("thinking", caps.tier.key()));
        }
        let conversation = Conversation::start(&config)?;
        Ok(Self {
            config,
            adapter,
            conversation,
            history: Vec::new(),
            current_image: None,
            image_counter: 0,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.current_image.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn current_image(&self) -> Option<&ImageHandle> {
        self.current_image.as_ref()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            tier: self.config.tier,
            thinking: self.config.thinking,
            aspect_ratio: self.config.aspect_ratio.clone(),
            resolution: self.config.resolution.clone(),
            images_generated: self.image_counter,
            has_image: self.current_image.is_some(),
            history_len: self.history.len(),
            state: self.state(),
        }
    }

    /// One turn. The user message always lands in `history`; it joins the
    /// conversation only when the backend answered it.
    pub fn send(&mut self, message: &str) -> Result<TurnOutcome, GenError> {
        self.history.push(ChatTurn {
            role: Role::User,
            content: message.to_string(),
        });
        self.conversation
            .contents
            .push(NativeAdapter::user_content(message, &[]));

        let reply = match self
            .adapter
            .exchange(&self.conversation.settings, &self.conversation.contents)
        {
            Ok(reply) => reply,
            Err(err) => {
                self.conversation.contents.pop();
                return Err(err);
            }
        };

        let text = reply.texts.join("\n").trim().to_string();
        let outcome = match reply.images.into_iter().last() {
            Some(image) => {
                self.current_image = Some(image);
                self.image_counter += 1;
                self.history.push(ChatTurn {
                    role: Role::Assistant,
                    content: IMAGE_MARKER.to_string(),
                });
                TurnOutcome::Image {
                    text: (!text.is_empty()).then_some(text),
                }
            }
            None if !text.is_empty() => {
                self.history.push(ChatTurn {
                    role: Role::Assistant,
                    content: text.clone(),
                });
                TurnOutcome::Text(text)
            }
            None => {
                self.conversation.contents.pop();
                return Err(GenError::Backend(NO_IMAGE_DETAIL.to_string()));
            }
        };
        self.conversation.contents.push(reply.model_content);
        tracing::debug!(
            turns = self.conversation.contents.len(),
            images = self.image_counter,
            "chat turn complete"
        );
        Ok(outcome)
    }

    /// Writes the current image into the output directory, under `name` or
    /// an auto-generated one. An absolute `name` is used as is.
    pub fn save(&self, name: Option<&str>) -> Result<PathBuf, GenError> {
        let image = self.current_image.as_ref().ok_or(GenError::NoImage)?;
        let path = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => self
                .config
                .output_dir
                .join(output::ensure_extension(Path::new(name))),
            None => self.config.output_dir.join(format!(
                "chat_{}_{}.png",
                output::timestamp(),
                self.image_counter
            )),
        };
        output::write_image(image, &path).map_err(|err| GenError::Output(format!("{err:#}")))?;
        Ok(path)
    }

    /// Resets the conversation.
    pub fn set_aspect_ratio(&mut self, raw: &str) -> Result<(), GenError> {
        let ratio = resolve_aspect_ratio(raw, native_caps(self.config.tier)?)?;
        let mut next = self.config.clone();
        next.aspect_ratio = ratio.to_string();
        self.reconfigure(next)
    }

    /// Resets the conversation.
    pub fn set_resolution(&mut self, raw: &str) -> Result<(), GenError> {
        let resolution = check_resolution(raw, native_caps(self.config.tier)?)?;
        let mut next = self.config.clone();
        next.resolution = Some(resolution.as_str().to_string());
        self.reconfigure(next)
    }

    /// Resets the conversation. Only native tiers are accepted.
    pub fn set_tier(&mut self, raw: &str) -> Result<(), GenError> {
        let tier = Backend::Native.resolve_tier(Some(raw))?;
        let mut next = self.config.clone();
        next.tier = tier;
        self.reconfigure(next)
    }

    /// Resets the conversation.
    pub fn set_thinking(&mut self, enabled: bool) -> Result<(), GenError> {
        let caps = native_caps(self.config.tier)?;
        if enabled && !caps.thinking {
            return Err(GenError::unsupported("thinking", caps.tier.key()));
        }
        let mut next = self.config.clone();
        next.thinking = enabled;
        self.reconfigure(next)
    }

    pub fn clear(&mut self) -> Result<(), GenError> {
        self.reconfigure(self.config.clone())?;
        self.image_counter = 0;
        Ok(())
    }

    fn reconfigure(&mut self, config: ChatConfig) -> Result<(), GenError> {
        let conversation = Conversation::start(&config)?;
        tracing::info!(model = config.tier.model_id(), aspect = %config.aspect_ratio, "chat conversation restarted");
        self.config = config;
        self.conversation = conversation;
        self.history.clear();
        self.current_image = None;
        Ok(())
    }
}

fn native_caps(tier: ModelTier) -> Result<&'static Capabilities, GenError> {
    capabilities(Backend::Native, tier)
}

fn check_resolution(raw: &str, caps: &Capabilities) -> Result<Resolution, GenError> {
    if !caps.has_variable_resolution() {
        return Err(GenError::unsupported("image size", caps.tier.key()));
    }
    raw.parse::<Resolution>()
        .ok()
        .filter(|value| caps.supports_resolution(*value))
        .ok_or_else(|| GenError::validation("image size", raw.trim(), &caps.resolution_names()))
}
