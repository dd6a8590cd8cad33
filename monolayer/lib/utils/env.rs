use std::{env, path::PathBuf};

use crate::{LayerError, LayerResult};

use super::MONOLAYER_ROOTFS_ENV_VAR;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads the root filesystem path from the `MONOLAYER_ROOTFS` environment variable.
///
/// Only the presence of the variable is checked here. Whether the path exists and is a directory is
/// checked by [`crate::layer::apply_layer`] before any archive is opened.
pub fn get_rootfs_path() -> LayerResult<PathBuf> {
    match env::var_os(MONOLAYER_ROOTFS_ENV_VAR) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(LayerError::MissingRootfsConfig(
            MONOLAYER_ROOTFS_ENV_VAR.to_string(),
        )),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
