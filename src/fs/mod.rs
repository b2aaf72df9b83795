//! Memory-mapped sliding-window file I/O (component B) and its ASCII
//! translation wrapper.

#[allow(unsafe_code)]
mod mapped_file;
mod ascii;

pub use ascii::AsciiFile;
pub use mapped_file::{FileOperation, MappedFile};
