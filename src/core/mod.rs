//! Core filesystem implementation
//!
//! - [`error`] - Error types
//! - [`header`] - Image geometry stored at the start of block 0
//! - [`io`] - Backing storage and block addressing
//! - [`allocator`] - Block map and first-fit allocation
//! - [`catalog`] - Flat file table
//! - [`handle`] - Open-handle cursors
//! - [`codec`] - On-disk metadata encoding
//! - [`filesystem`] - The filesystem API
//! - [`config`] - TOML configuration
//! - [`snapshot`] - Read-only state export
//! - [`shared`] - Thread-safe wrapper
//!
//! ## Image layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Block 0: header + block map                  │
//! ├──────────────────────────────────────────────┤
//! │ Block 1..N: FileEntry records, FileData      │
//! │             content, or Empty                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A file's chain is its FileEntry block followed by its FileData blocks in
//! logical order. Chains need not be contiguous.

pub mod allocator;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod handle;
pub mod header;
pub mod io;
pub mod shared;
pub mod snapshot;

mod integration_tests;

pub use filesystem::{create_filesystem, load_filesystem, FileSystem, FsStats};
