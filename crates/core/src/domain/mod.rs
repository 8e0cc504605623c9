pub mod action;
pub mod flow;
pub mod message;

pub use action::{ActionKind, PendingAction};
pub use flow::{FlowCategory, UnknownFlowLabel};
pub use message::{MessageRole, TurnMessage};
