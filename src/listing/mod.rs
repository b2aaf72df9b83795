//! Directory-listing engine (component C): `LIST`/`NLST`/`MLSD` formats over
//! a directory iterator that also injects purely-virtual mount points.

mod entry;
mod format;

pub use entry::{is_hidden, list_entries, DirEntry};
pub use format::{facts_line, format_batch, ListFormat, MlstFacts};
