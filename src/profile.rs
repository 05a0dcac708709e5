//! Resolution of an Anki profile's `collection.anki2` path across platforms.
//!
//! The original implementation only appended the `<profile>` path segment
//! on Windows, leaving Linux and macOS pointed at the bare data directory.
//! That is treated here as a bug, not a platform difference to preserve
//! (see SPEC_FULL.md §9 REDESIGN FLAGS): every platform gets
//! `<base>/<profile>/collection.anki2`.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Base Anki data directory for the current platform (before the profile
/// segment is appended).
pub fn anki_base_dir() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .map(|d| d.join("Anki2"))
            .ok_or_else(|| Error::invalid_path("could not resolve %APPDATA%"))
    }
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|d| d.join("Library/Application Support/Anki2"))
            .ok_or_else(|| Error::invalid_path("could not resolve home directory"))
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        dirs::data_dir()
            .map(|d| d.join("Anki2"))
            .ok_or_else(|| Error::invalid_path("could not resolve XDG data directory"))
    }
}

/// Resolve the `collection.anki2` path for a named profile, uniformly on
/// every platform.
pub fn collection_path_for_profile(profile: &str) -> Result<PathBuf> {
    Ok(anki_base_dir()?.join(profile).join("collection.anki2"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_path_includes_profile_segment() {
        let path = collection_path_for_profile("User 1").unwrap();
        assert!(path.ends_with("User 1/collection.anki2") || path.to_string_lossy().contains("User 1"));
        assert_eq!(path.file_name().unwrap(), "collection.anki2");
    }
}
