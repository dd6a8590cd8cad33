use std::{
    env,
    path::{Path, PathBuf},
};

use getset::Getters;

use crate::{LayerError, LayerResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Switches the process working directory into a root filesystem for the length of a scope.
///
/// The previous working directory is restored by [`WorkdirGuard::leave`], or on drop when the scope
/// is left early through `?` or a panic. The working directory is process-wide, so only one guard
/// should be live at a time.
#[derive(Debug, Getters)]
#[getset(get = "pub with_prefix")]
pub struct WorkdirGuard {
    /// The directory that was current before the guard was entered.
    previous: PathBuf,

    /// The directory the guard switched into.
    current: PathBuf,

    #[getset(skip)]
    restored: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WorkdirGuard {
    /// Records the current working directory and switches to `dir`.
    pub fn enter(dir: impl AsRef<Path>) -> LayerResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let previous = env::current_dir().map_err(|source| LayerError::WorkdirChange {
            path: dir.clone(),
            source,
        })?;

        env::set_current_dir(&dir).map_err(|source| LayerError::WorkdirChange {
            path: dir.clone(),
            source,
        })?;

        tracing::debug!("Entered {} (was {})", dir.display(), previous.display());

        Ok(Self {
            previous,
            current: dir,
            restored: false,
        })
    }

    /// Restores the previous working directory, reporting failure to the caller.
    pub fn leave(mut self) -> LayerResult<()> {
        self.restore()
    }

    fn restore(&mut self) -> LayerResult<()> {
        if self.restored {
            return Ok(());
        }

        self.restored = true;
        env::set_current_dir(&self.previous).map_err(|source| LayerError::WorkdirChange {
            path: self.previous.clone(),
            source,
        })?;

        tracing::debug!("Restored working directory {}", self.previous.display());
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("Error restoring working directory in drop: {}", e);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
