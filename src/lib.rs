// Public modules
pub mod backend;
pub mod chat;
pub mod client;
pub mod dashboard;
pub mod decoder;
pub mod error;
pub mod observability;
pub mod paginate;
pub mod preview;
pub mod progress;
pub mod render;
pub mod types;
pub mod utils;

// Re-exports
pub use backend::StudioBackend;
pub use client::StudioClient;
pub use dashboard::Dashboard;
pub use decoder::{ByteStream, StreamDecoder, Utf8Decoder};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use paginate::{Page, Paginator, paginate};
pub use preview::{BookNavigator, Preview, Sheet, render_preview};
pub use progress::{ProgressTracker, extract_progress};
pub use types::*;
