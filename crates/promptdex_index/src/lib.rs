//! Promptdex Index - in-memory index of a prompt directory tree
//!
//! Turns a directory of prompt documents into a [`PromptStructure`] snapshot
//! and keeps it fresh as files change.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌───────────────┐
//! │ FileAccess  │     │   Walker    │     │  Organizer  │     │  PromptIndex  │
//! │   (port)    │────▶│ (records +  │────▶│ (folders +  │────▶│ (cache, dedup │
//! │             │     │   parser)   │     │  sorting)   │     │  + debounce)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └───────────────┘
//!                                                                     ▲
//!                                                     IndexWatcher ───┘
//! ```
//!
//! # Core Concepts
//!
//! - **PromptFile**: one document with title, description and tags
//! - **PromptFolder**: prompts sharing one parent directory
//! - **PromptStructure**: an immutable snapshot of the whole tree
//! - **PromptIndex**: owns the snapshot, builds at most once at a time and
//!   coalesces invalidation bursts into one rebuild

pub mod config;
pub mod error;
pub mod fs;
pub mod manager;
pub mod memory;
pub mod organizer;
pub mod parser;
pub mod patterns;
pub mod root;
pub mod types;
pub mod walker;
pub mod watch;

// Re-exports for convenience
pub use config::{IndexConfig, ScanOptions};
pub use error::{IndexError, Result};
pub use fs::{DirEntry, EntryKind, FileAccess, LocalFileAccess};
pub use manager::{
    IndexPhase, IndexRefreshed, IndexStats, PromptIndex, RefreshFuture, RefreshReason,
};
pub use memory::{IoCounts, MemoryFileAccess};
pub use organizer::organize;
pub use parser::{parse_document, ParsedDocument};
pub use root::{FixedRoot, RootResolver};
pub use types::{PromptFile, PromptFolder, PromptStructure};
pub use walker::{scan, ScanScope};
pub use watch::IndexWatcher;
