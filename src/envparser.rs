//! Key-value env parser.
//!
//! Parses `KEY=VALUE` multi-line blobs, as emitted by `barebox-state
//! --get-dump` and `fw_printenv`, into an ordered list of pairs. Needed
//! because `BOOT_ORDER` re-emission depends on preserving input order,
//! something a `HashMap` would lose.

use crate::Error;

/// Parse a `KEY=VALUE` blob into an ordered list of pairs.
///
/// Blank lines and lines that are only whitespace are ignored. Each
/// remaining line must contain a `=`; a line without one is a
/// `ParseError` carrying the offending line. Duplicate keys: last value
/// wins, but the pair keeps the position of the key's first occurrence.
pub fn parse_env_blob(blob: &str) -> Result<Vec<(String, String)>, Error> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for raw_line in blob.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| Error::parse(raw_line.to_string()))?;
        let key = key.trim();
        let value = value.trim();

        if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value.to_string();
        } else {
            pairs.push((key.to_string(), value.to_string()));
        }
    }

    Ok(pairs)
}

/// Look up a single key's value in an already-parsed pair list.
pub fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Serialize pairs back into `KEY=VALUE\n` form, in list order.
pub fn render_env_blob(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (k, v) in pairs {
        out.push_str(k);
        out.push('=');
        out.push_str(v);
        out.push('\n');
    }
    out
}
