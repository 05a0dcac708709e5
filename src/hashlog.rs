//! The `.ki/hashes` append-only log: one `md5  filename` line per successful
//! clone/pull/push, the last line being authoritative.

use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::HashEntry;

fn line_re() -> Regex {
    Regex::new(r"^([0-9a-f]{32})  (.+)$").unwrap()
}

/// Parse all entries of a hashes file, in file order.
pub fn parse(contents: &str) -> Result<Vec<HashEntry>> {
    let re = line_re();
    let mut out = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let caps = re
            .captures(line)
            .ok_or_else(|| Error::invalid_path(format!("malformed hashes line: {:?}", line)))?;
        out.push(HashEntry {
            md5: caps[1].to_string(),
            filename: caps[2].to_string(),
        });
    }
    Ok(out)
}

/// Read and return the most recent entry, if any.
pub fn read_last(path: &Path) -> Result<Option<HashEntry>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
    Ok(parse(&contents)?.into_iter().last())
}

/// Append one `md5  filename` line to the hashes file, creating it if
/// necessary.
pub fn append(path: &Path, md5: &str, filename: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io_at(path, e))?;
    writeln!(file, "{}  {}", md5, filename).map_err(|e| Error::io_at(path, e))?;
    Ok(())
}

/// Compute the MD5 checksum of a file's contents, formatted as lowercase hex.
pub fn md5_of_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::io_at(path, e))?;
    Ok(format!("{:x}", md5::compute(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_multiple_lines() {
        let contents = "d41d8cd98f00b204e9800998ecf8427e  collection.anki2\n\
                         5d41402abc4b2a76b9719d911017c592  collection.anki2\n";
        let entries = parse(contents).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.last().unwrap().md5, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn parse_rejects_malformed_line() {
        assert!(parse("not-a-valid-line\n").is_err());
    }

    #[test]
    fn append_and_read_last_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes");
        append(&path, "d41d8cd98f00b204e9800998ecf8427e", "collection.anki2").unwrap();
        append(&path, "5d41402abc4b2a76b9719d911017c592", "collection.anki2").unwrap();
        let last = read_last(&path).unwrap().unwrap();
        assert_eq!(last.md5, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn read_last_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes");
        assert!(read_last(&path).unwrap().is_none());
    }
}
