//! Request building, backend adapters, batch execution and the chat
//! session on top of `genimg-contracts`.

pub mod adapter;
pub mod builder;
pub mod dryrun;
pub mod edit;
pub mod executor;
pub mod generator;
pub mod output;
pub mod session;
pub mod transport;

pub use adapter::{AdapterReply, AdapterSet, BackendAdapter, BatchAdapter, NativeAdapter};
pub use builder::{build, BackendCallConfig, BatchCallConfig, CallPlan, NativeCallConfig};
pub use dryrun::DryrunTransport;
pub use edit::{EditOperation, EditRequest};
pub use executor::BatchExecutor;
pub use generator::Generator;
pub use session::{ChatConfig, ChatSession, ChatTurn, Role, SessionState, SessionStatus, TurnOutcome};
pub use transport::{HttpTransport, Transport};
