pub mod record;
pub mod store;

pub use record::{BonusEntry, ChangeReason, OrderTotals, PreviewChange, PreviewLine, PreviewRecord};
pub use store::{InMemoryPreviewStore, PreviewCache, PreviewStore, preview_token};
