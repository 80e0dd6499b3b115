//! Domain models for sessions, messages, and categories

mod category;
mod message;
mod session;

pub use category::Category;
pub use message::{MessageDetail, MessageId, MessageSummary, SentMessage, ThreadId};
pub use session::{Credential, Session, SessionId};
