//! Mutable in-memory text buffer core for editor components.
//!
//! A [`Document`] stores text in a pluggable [`TextStore`], tracks line
//! boundaries incrementally, keeps identity-tracked sticky positions valid
//! across edits, overlays typed partitionings on the text, and runs a
//! change-notification pipeline that consumers (rulers, outline views,
//! search UI) subscribe to. [`FindReplaceAdapter`] drives stateful
//! search/replace over a document, and [`ChildDocumentManager`] derives
//! child documents that are live windows into a master's text.
//!
//! Everything here is single-threaded and synchronous; suspension and
//! deferral controls order work within one call stack.

pub mod child;
pub mod document;
pub mod error;
pub mod find_replace;
pub mod line_tracker;
pub mod partition;
pub mod position;
pub mod region;
pub mod store;
pub mod updater;

// Re-export the main types for convenience
pub use child::{CHILD_RANGE_CATEGORY, ChildDocument, ChildDocumentListener, ChildDocumentManager};
pub use document::{Document, DocumentEvent, DocumentListener, PartitioningListener};
pub use error::DocumentError;
pub use find_replace::FindReplaceAdapter;
pub use line_tracker::{DELIMITERS, DelimiterMatch, LineRecord, LineTracker, next_delimiter};
pub use partition::{DEFAULT_CONTENT_TYPE, DEFAULT_PARTITIONING, DocumentPartitioner};
pub use position::{DEFAULT_CATEGORY, Position, PositionHandle, PositionStore};
pub use region::{Region, TypedRegion};
pub use store::{PieceTableStore, StringTextStore, TextStore};
pub use updater::{DefaultPositionUpdater, PositionUpdater};
