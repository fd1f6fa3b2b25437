//! Input side: target expansion, encoding detection and line reading.

pub mod paths;
pub mod reader;

pub use crate::engine::{Line, LineEnding};
pub use paths::expand_targets;
pub use reader::{detect_encoding, resolve_encoding, LineReader, DEFAULT_CHUNK_SIZE};
