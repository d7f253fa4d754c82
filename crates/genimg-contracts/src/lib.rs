//! Backend-independent contracts: the capability table, the request and
//! result model, the batch document, the chat command grammar and the error
//! taxonomy shared by the engine and the CLI.

pub mod capabilities;
pub mod chat;
pub mod error;
pub mod events;
pub mod jobs;
pub mod request;

pub use capabilities::{capabilities, Backend, Capabilities, ModelTier, PersonPolicy, Resolution};
pub use error::{GenError, GenResult};
pub use request::{GenerationIntent, GenerationRequest, GenerationResult, ImageHandle, ResultStatus};
