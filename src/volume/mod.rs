//! Persistent data volume layout.
//!
//! The volume is mounted at the data root inside the container. Every entry
//! lives strictly under that root; home-directory symlinks point into it.

pub mod entries;
pub mod layout;

pub use entries::{EntryKind, MirrorMode, VolumePathEntry, builtin_entries};
pub use layout::{LayoutReport, SkippedEntry, ensure_layout};
