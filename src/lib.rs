//! Serialize a directory tree into a flat, self-describing record stream and recreate a tree
//! from such a stream.
//!
//! A stream is a TRANSMISSION_START record, the contents of the source directory as a
//! DIRECTORY_START…DIRECTORY_END bracket at depth 1, and a TRANSMISSION_END record.  Every
//! directory entry is a DIRECTORY_ENTRY record (mode, size, name) followed either by one FILE_DATA
//! record or by a nested bracket one level deeper.  See [`record`] for the byte layout.
//!
//! ```no_run
//! use transplant::{deserialize, serialize, Options};
//!
//! let mut stream = vec![];
//! serialize("some/dir", &mut stream, &Options::default())?;
//! deserialize("copy/of/dir", stream.as_slice(), &Options::default())?;
//! # Ok::<(), transplant::Error>(())
//! ```

pub mod deserialize;
pub mod error;
pub mod list;
pub mod options;
pub mod path_stack;
pub mod record;
pub mod serialize;
mod util;

#[cfg(test)]
mod test;

pub use deserialize::deserialize;
pub use error::{Error, ErrorKind, Result};
pub use list::list;
pub use options::{Limits, Options};
pub use path_stack::PathStack;
pub use serialize::serialize;
