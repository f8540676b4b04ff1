pub mod conversation;
pub mod media;
pub mod segment;
pub mod transcript;

pub use conversation::{Conversation, ElementHandle};
pub use media::{MediaItem, MediaKind};
pub use segment::{MonthKey, MonthSegment};
pub use transcript::ExtractedTranscript;
