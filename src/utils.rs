//! Utility functions: path sanitization, title normalization, HTML entities

/// Characters that are invalid in file or directory names on at least one
/// supported platform.
const INVALID_PATH_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Strip filesystem-invalid characters from a single path component.
///
/// Control characters are removed as well; trailing dots and spaces are
/// trimmed (Windows rejects them). An input that sanitizes to nothing
/// becomes `"_"` so path construction never produces an empty component.
pub fn sanitize_path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !INVALID_PATH_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_end_matches(['.', ' ']).to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Normalize a scraped chapter or series title: trim, convert tabs to
/// spaces, collapse runs of internal whitespace, decode HTML entities.
pub fn normalize_title(raw: &str) -> String {
    let mut title = decode_html_entities(raw.trim());
    title = title.replace('\t', " ");
    while title.contains("  ") {
        title = title.replace("  ", " ");
    }
    title.trim().to_string()
}

/// Decode the HTML entities that show up in scraped titles and URLs.
///
/// Handles the named entities common in listing markup plus numeric
/// references (`&#NN;` and `&#xHH;`). Unknown entities pass through
/// verbatim.
pub fn decode_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            // Entities longer than "&#xffffff;" are not entities
            Some(end) if end <= 10 => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = if let Some(hex) = digits.strip_prefix(['x', 'X']) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                digits.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}
