// Public modules
pub mod chat_request;
pub mod ebook_record;
pub mod layout_mode;
pub mod message;

// Re-exports
pub use chat_request::{ChatMode, ChatRequest};
pub use ebook_record::{EbookList, EbookRecord, EbookStatus, SaveEbookParams};
pub use layout_mode::{LayoutMode, LayoutModeParseError};
pub use message::{Message, MessageRole};
