//! Folder-name encoding for project directories.
//!
//! `/Users/alice/.config/app` is stored as `-Users-alice--config-app`: the
//! leading separator becomes a leading dash, a separator followed by a dot
//! becomes `--`, and every other separator becomes `-`. Literal dashes in the
//! original path are indistinguishable from separators, so decoded values are
//! display labels only and are never fed back into filesystem calls.

pub const ENCODED_MARKER: char = '-';

pub fn is_encoded_project_name(name: &str) -> bool {
    name.starts_with(ENCODED_MARKER)
}

pub fn encode_project_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '/' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            out.push_str("--");
        } else {
            out.push(ENCODED_MARKER);
        }
    }
    out
}

pub fn decode_project_name(folder_name: &str) -> String {
    let rooted = match folder_name.strip_prefix(ENCODED_MARKER) {
        Some(rest) => format!("/{rest}"),
        None => folder_name.to_string(),
    };
    rooted.replace("--", "/.").replace(ENCODED_MARKER, "/")
}
