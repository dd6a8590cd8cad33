//! Configuration for applying a layer to a root filesystem.

mod apply;
mod defaults;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use apply::*;
pub use defaults::*;
