pub mod errors;
pub mod event;
pub mod events;
pub mod ids;
pub mod session;
pub mod transcript;
pub mod turn;

pub use errors::ChatError;
pub use event::ChatEvent;
pub use events::SessionEvent;
pub use ids::{RequestId, SessionId, TurnId};
pub use session::SessionState;
pub use transcript::Transcript;
pub use turn::{ConversationTurn, Role, ToolCall};
