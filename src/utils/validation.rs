use std::path::Path;

const MAX_KEY_COMPONENT_LEN: usize = 255;

/// Makes a client-supplied filename safe to embed in an object key.
///
/// Only the last path component survives, reserved characters become `_`,
/// and the result is capped at 255 bytes on a char boundary. The untouched
/// name is still what gets recorded in the metadata table.
pub fn sanitize_key_component(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    if name.is_empty() {
        return "unnamed".to_string();
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    if sanitized.len() > MAX_KEY_COMPONENT_LEN {
        let mut end = MAX_KEY_COMPONENT_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    }
}
