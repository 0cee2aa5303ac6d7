//! File resolution and directory listing.
//!
//! # Data Flow
//! ```text
//! decoded URL path
//!     → resolver.rs (confine to root, dotfile policy, stat)
//!     → File      → streamed by http::response
//!     → Directory → listing.rs (filtered, sorted, rendered as HTML)
//!     → NotFound  → 404
//! ```
//!
//! # Design Decisions
//! - Read-only: nothing here writes to the served tree
//! - Traversal and symlink escapes look exactly like missing files
//! - The dotfile flag governs listings and direct fetches alike

pub mod listing;
pub mod resolver;

pub use listing::{DirectoryListing, EntryKind, ListingEntry};
pub use resolver::{FileResolver, Resolution, ServedFile};
