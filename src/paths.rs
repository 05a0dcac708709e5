use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::PathKind;

/// Classify `path` as file/dir/empty-dir/missing-with-existing-parent/
/// missing-with-missing-parent.
pub fn classify(path: &Path) -> Result<PathKind> {
    PathKind::classify(path).map_err(|e| Error::io_at(path, e))
}

/// Require `path` to not exist (or to be an empty directory), as clone
/// targets must be.
pub fn require_clone_target(path: &Path) -> Result<()> {
    match classify(path)? {
        PathKind::NoFile | PathKind::NoPath | PathKind::EmptyDir => Ok(()),
        PathKind::Dir | PathKind::File => Err(Error::non_empty_working_tree(path)),
    }
}

/// Search upward from `start` for a `.ki` directory, returning the working
/// tree root that contains it.
pub fn find_ki_root(start: &Path) -> Result<PathBuf> {
    let mut dir = start
        .canonicalize()
        .map_err(|e| Error::io_at(start, e))?;
    loop {
        if dir.join(crate::types::KI_DIR).is_dir() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(Error::not_a_ki_repo(start));
        }
    }
}

/// Lowercase, strip HTML tags, replace non-alphanumeric runs with `-`,
/// collapse repeats, trim, and cap at 60 characters.
///
/// Falls back to `<model>-<guid>-<created_ms>` when the result would be
/// empty (e.g. an entirely-HTML or entirely-punctuation sort field).
pub fn slugify(text: &str, fallback_model: &str, fallback_guid: &str, fallback_created_ms: i64) -> String {
    let stripped = strip_html(text);
    let lower = stripped.to_lowercase();

    let mut out = String::new();
    let mut last_was_dash = false;
    for ch in lower.chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    let truncated: String = trimmed.chars().take(60).collect();
    let truncated = truncated.trim_matches('-');

    if truncated.is_empty() {
        format!(
            "{}-{}-{}",
            fallback_model.to_lowercase(),
            &fallback_guid[..fallback_guid.len().min(8)],
            fallback_created_ms
        )
    } else {
        truncated.to_string()
    }
}

pub(crate) fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Disambiguate `name` against `taken` by appending `_N` suffixes.
pub fn disambiguate(name: &str, taken: &std::collections::HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", name, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Split a `::`-separated Anki deck name into filesystem path components.
pub fn deck_components(deck: &str) -> Vec<&str> {
    deck.split("::").collect()
}

/// Join filesystem path components back into a `::`-separated deck name.
pub fn components_to_deck(components: &[&str]) -> String {
    components.join("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello, World!", "Basic", "abcdefgh", 1), "hello-world");
    }

    #[test]
    fn slugify_strips_html() {
        assert_eq!(slugify("<b>Bold</b> text", "Basic", "abcdefgh", 1), "bold-text");
    }

    #[test]
    fn slugify_falls_back_when_empty() {
        let s = slugify("<img src=\"x.png\">", "Basic", "abcdefgh", 42);
        assert_eq!(s, "basic-abcdefgh-42");
    }

    #[test]
    fn slugify_truncates_to_60() {
        let long = "a ".repeat(80);
        let s = slugify(&long, "Basic", "abcdefgh", 1);
        assert!(s.len() <= 60);
    }

    #[test]
    fn deck_components_roundtrip() {
        let d = "Languages::French::Verbs";
        let comps = deck_components(d);
        assert_eq!(comps, vec!["Languages", "French", "Verbs"]);
        assert_eq!(components_to_deck(&comps), d);
    }

    #[test]
    fn disambiguate_appends_suffix() {
        let mut taken = std::collections::HashSet::new();
        taken.insert("note".to_string());
        assert_eq!(disambiguate("note", &taken), "note_1");
        taken.insert("note_1".to_string());
        assert_eq!(disambiguate("note", &taken), "note_2");
    }
}
