//! File actions module.
//!
//! This module provides functionality for:
//! - Backup copies before a target is rewritten
//! - Writing retained lines in place or into an output directory
//!
//! ```no_run
//! use linedupe::actions::{create_backup, write_lines};
//! use linedupe::engine::split_lines;
//! use std::path::Path;
//!
//! let target = Path::new("notes.txt");
//! let backup = create_backup(target)?;
//! write_lines(target, &split_lines("kept\n"))?;
//! # Ok::<(), linedupe::error::DedupError>(())
//! ```

pub mod backup;
pub mod write;

pub use backup::{backup_path, create_backup};
pub use write::{write_lines, Destination, RetainedWriter};
