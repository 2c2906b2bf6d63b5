//! Chat domain logic
//!
//! Everything here is independent of the HTTP surface: classifying stream
//! events, replaying history, consuming a live turn and handling uploads.

pub mod context;
pub mod items;
pub mod render;
pub mod status;
pub mod turn;
pub mod upload;

pub use context::{ChatContext, ChatError, Prompt};
pub use items::{Content, ConversationItem, ItemKind};
pub use render::{render_history, DisplayBody, DisplayDirective, ImageSource};
pub use status::{classify, EventKind, StatusPhase, StatusUpdate};
pub use turn::{run_turn, RenderCommand, TurnOutcome, TurnState};
pub use upload::{Attachment, FileStorage, UploadCoordinator, UploadError, UploadOutcome};
