mod error;
mod patcher;

pub use error::PatchError;
pub use patcher::{PatchOp, Patcher};
