//! Parsing and serialization of the note file grammar:
//!
//! ```text
//! # Note
//! ```
//! guid: <guid>
//! notetype: <model>
//! ```
//!
//! ### Tags
//! ```
//! tag-one tag-two
//! ```
//!
//! ## Front
//! <field body>
//!
//! ## Back
//! <field body>
//! ```

use sha2::{Digest, Sha256};

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::types::FlatNote;

const BASE91_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,./:;<=>?@[]^_`{|}~\"";

/// Compute a stable GUID for a note by hashing its field contents.
///
/// Mirrors the original implementation: SHA-256 over the fields joined with
/// `__`, base91-encoded over the first 8 bytes of the digest.
pub fn generate_guid(fields: &[String]) -> String {
    let joined = fields.join("__");
    let digest = Sha256::digest(joined.as_bytes());
    base91_encode(&digest[..8])
}

fn base91_encode(bytes: &[u8]) -> String {
    let mut n: u128 = 0;
    for &b in bytes {
        n = (n << 8) | b as u128;
    }
    if n == 0 {
        return (BASE91_ALPHABET[0] as char).to_string();
    }
    let base = BASE91_ALPHABET.len() as u128;
    let mut out = Vec::new();
    while n > 0 {
        let digit = (n % base) as usize;
        out.push(BASE91_ALPHABET[digit]);
        n /= base;
    }
    out.reverse();
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Returns `true` when the first lines of `content` match the fixed note
/// header grammar, identifying it as a ki note file.
pub fn is_anki_note(content: &str) -> bool {
    let mut lines = content.lines();
    matches!(lines.next(), Some("# Note"))
        && matches!(lines.next(), Some("```"))
        && lines.next().map(|l| l.starts_with("guid: ")).unwrap_or(false)
        && lines.next().map(|l| l.starts_with("notetype: ")).unwrap_or(false)
        && matches!(lines.next(), Some("```"))
}

/// Parse a note file's contents into a [`FlatNote`].
pub fn parse_note(content: &str, title_hint: &str) -> Result<FlatNote> {
    let mut lines = content.lines().peekable();

    expect_line(&mut lines, "# Note")?;
    expect_line(&mut lines, "```")?;
    let guid = expect_prefixed(&mut lines, "guid: ")?;
    let model = expect_prefixed(&mut lines, "notetype: ")?;
    expect_line(&mut lines, "```")?;

    // blank line
    while matches!(lines.peek(), Some(l) if l.trim().is_empty()) {
        lines.next();
    }

    let mut tags = Vec::new();
    if matches!(lines.peek(), Some(&"### Tags")) {
        lines.next();
        expect_line(&mut lines, "```")?;
        while let Some(&line) = lines.peek() {
            if line == "```" {
                break;
            }
            lines.next();
            for tag in line.split_whitespace() {
                tags.push(tag.to_string());
            }
        }
        expect_line(&mut lines, "```")?;
    }

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut current_field: Option<(String, Vec<&str>)> = None;
    for line in lines {
        if let Some(name) = line.strip_prefix("## ") {
            if let Some((fname, body)) = current_field.take() {
                fields.push((fname, finish_field_body(body)));
            }
            current_field = Some((name.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current_field.as_mut() {
            body.push(line);
        }
    }
    if let Some((fname, body)) = current_field.take() {
        fields.push((fname, finish_field_body(body)));
    }

    if fields.is_empty() {
        return Err(Error::invalid_note_file(format!(
            "note {} has no fields",
            guid
        )));
    }

    Ok(FlatNote {
        title: title_hint.to_string(),
        guid,
        model,
        tags,
        fields,
    })
}

fn finish_field_body(lines: Vec<&str>) -> String {
    // Trim exactly one leading and one trailing blank line, produced by the
    // serializer's own spacing.
    let mut start = 0;
    let mut end = lines.len();
    if lines.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        start = 1;
    }
    if end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    plain_to_html(&lines[start..end].join("\n"))
}

fn expect_line<'a, I: Iterator<Item = &'a str>>(lines: &mut I, expected: &str) -> Result<()> {
    match lines.next() {
        Some(l) if l == expected => Ok(()),
        other => Err(Error::invalid_note_file(format!(
            "expected {:?}, found {:?}",
            expected, other
        ))),
    }
}

fn expect_prefixed<'a, I: Iterator<Item = &'a str>>(lines: &mut I, prefix: &str) -> Result<String> {
    match lines.next() {
        Some(l) if l.starts_with(prefix) => Ok(l[prefix.len()..].trim().to_string()),
        other => Err(Error::invalid_note_file(format!(
            "expected line starting with {:?}, found {:?}",
            prefix, other
        ))),
    }
}

/// Serialize a [`FlatNote`] back into note file content.
pub fn serialize_note(note: &FlatNote) -> String {
    let mut out = String::new();
    out.push_str("# Note\n```\n");
    out.push_str(&format!("guid: {}\n", note.guid));
    out.push_str(&format!("notetype: {}\n", note.model));
    out.push_str("```\n\n");

    if !note.tags.is_empty() {
        out.push_str("### Tags\n```\n");
        out.push_str(&note.tags.join(" "));
        out.push('\n');
        out.push_str("```\n\n");
    }

    for (name, value) in &note.fields {
        out.push_str(&format!("## {}\n", name));
        let screen = html_to_screen(value);
        out.push_str(&Collection::escape_media_filenames(&screen, true));
        out.push_str("\n\n");
    }

    while out.ends_with("\n\n") {
        out.pop();
    }
    out.push('\n');
    out
}

/// Normalize HTML field content for display in a markdown file: convert
/// `<br>`-family tags to newlines, unescape common LaTeX delimiters, drop
/// empty `<b></b>`-style pairs, and strip `<style>` blocks.
pub fn html_to_screen(html: &str) -> String {
    let br_re = regex::Regex::new(r"(?i)<br\s*/?>").unwrap();
    let style_re = regex::Regex::new(r"(?is)<style>.*?</style>").unwrap();
    let empty_pair_re = regex::Regex::new(r"<(\w+)(\s[^>]*)?></\1>").unwrap();

    let mut s = style_re.replace_all(html, "").to_string();
    s = br_re.replace_all(&s, "\n").to_string();
    s = s.replace("\\[", "[").replace("\\]", "]");
    s = s.replace("\\(", "(").replace("\\)", ")");

    // Repeatedly strip empty tag pairs (e.g. <b></b>, <i></i>).
    loop {
        let next = empty_pair_re.replace_all(&s, "").to_string();
        if next == s {
            break;
        }
        s = next;
    }
    s
}

/// Partial inverse of [`html_to_screen`]: turns bare newlines into `<br>`
/// only when the text does not already contain HTML markup.
pub fn plain_to_html(screen: &str) -> String {
    let has_markup = screen.contains('<') && screen.contains('>');
    if has_markup {
        screen.to_string()
    } else {
        screen.replace('\n', "<br>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_is_stable_for_same_fields() {
        let f = vec!["Front text".to_string(), "Back text".to_string()];
        assert_eq!(generate_guid(&f), generate_guid(&f));
    }

    #[test]
    fn guid_changes_with_fields() {
        let a = vec!["Front".to_string()];
        let b = vec!["Front2".to_string()];
        assert_ne!(generate_guid(&a), generate_guid(&b));
    }

    #[test]
    fn round_trip_parse_serialize() {
        let note = FlatNote {
            title: "ignored".into(),
            guid: "abc123".into(),
            model: "Basic".into(),
            tags: vec!["lang".into(), "french".into()],
            fields: vec![
                ("Front".into(), "Bonjour".into()),
                ("Back".into(), "Hello".into()),
            ],
        };
        let text = serialize_note(&note);
        assert!(is_anki_note(&text));
        let parsed = parse_note(&text, "ignored").unwrap();
        assert_eq!(parsed.guid, note.guid);
        assert_eq!(parsed.model, note.model);
        assert_eq!(parsed.tags, note.tags);
        assert_eq!(parsed.fields, note.fields);
    }

    #[test]
    fn html_to_screen_converts_br() {
        assert_eq!(html_to_screen("a<br>b<br/>c"), "a\nb\nc");
    }

    #[test]
    fn html_to_screen_strips_empty_tags() {
        assert_eq!(html_to_screen("a<b></b>b"), "ab");
    }

    #[test]
    fn plain_to_html_converts_newlines_when_no_markup() {
        assert_eq!(plain_to_html("a\nb"), "a<br>b");
    }

    #[test]
    fn plain_to_html_leaves_markup_alone() {
        assert_eq!(plain_to_html("a<br>b"), "a<br>b");
    }

    #[test]
    fn is_anki_note_rejects_non_note() {
        assert!(!is_anki_note("# Something else\n"));
    }
}
