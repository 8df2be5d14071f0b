pub mod history;
mod session;

pub use history::{Role, TranscriptEntry, extract_reply};
pub use session::{ChatSession, FAILED_REPLY, SentMessage};
