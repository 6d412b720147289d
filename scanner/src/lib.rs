mod error;
mod scanner;

pub use error::ScanError;
pub use scanner::{is_owner_executable, walk, walk_until, EntryKind, PermCheck};
