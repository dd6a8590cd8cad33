//! Utility functions and types.

mod conversion;
mod env;
mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use conversion::*;
pub use env::*;
pub use path::*;
