//! Filesystem primitives used while repackaging archives.
//!
//! - [`AtomicFile`]: temp-then-rename output, deleted on abort.
//! - [`Workspace`]: scratch directory removed on drop.

mod atomic;
mod error;
mod workspace;

pub use atomic::AtomicFile;
pub use error::{Error, Result};
pub use workspace::Workspace;
