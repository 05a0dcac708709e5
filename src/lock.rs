use std::fs::OpenOptions;
use std::path::Path;

use fs2::FileExt;

use crate::error::{Error, Result};

/// Acquire an advisory file lock on the working tree, execute `f`, then
/// release.
///
/// Creates `<root>/.ki/ki.lock` using `fs2` with a blocking exclusive lock.
/// Serializes the backup-then-swap section of `push` across concurrent `ki`
/// processes, since that section briefly leaves the live collection file in
/// an inconsistent state between the backup copy and the overwrite.
///
/// # Arguments
/// * `root` - Working tree root (the directory containing `.ki/`).
/// * `f` - Closure to execute while the lock is held.
///
/// # Errors
/// Returns an error if the lock cannot be acquired.
pub fn with_repo_lock<F, T>(root: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let lock_path = root.join(".ki").join("ki.lock");

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io_at(&lock_path, e))?;

    file.lock_exclusive()
        .map_err(|e| Error::io_at(&lock_path, e))?;

    let result = f();

    let _ = file.unlock();

    result
    // file drops here, also releasing the lock
}
