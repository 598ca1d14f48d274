//! Text transforms between raw text, XML attribute text, and JSON that has to
//! survive inside an XML attribute value.
//!
//! Two layers are kept strictly apart:
//! - [`escape_attribute`] / [`from_attribute_safe`] are exact inverses and are
//!   what the serializer uses for every attribute it writes.
//! - [`to_attribute_safe`] is the same transform guarded by
//!   [`looks_escaped`], so text that is already in escaped form is passed
//!   through instead of being escaped a second time.
//!
//! [`to_json_in_attribute`] escapes the JSON-relevant subset only (no `'`);
//! [`from_attribute_safe`] decodes it as well.

/// Replacement text for every character the attribute layer escapes.
fn attribute_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&apos;"),
        '\n' => Some("&#xa;"),
        '\r' => Some("&#xd;"),
        '\t' => Some("&#x9;"),
        _ => None,
    }
}

fn json_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\n' => Some("&#xa;"),
        _ => None,
    }
}

fn escape_with(text: &str, table: fn(char) -> Option<&'static str>) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match table(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
    out
}

/// Escape `& < > " '` and line breaks into entity form. Always escapes;
/// [`from_attribute_safe`] undoes it exactly.
pub fn escape_attribute(text: &str) -> String {
    escape_with(text, attribute_entity)
}

/// Escape for an XML attribute unless the text already looks escaped.
///
/// Applying this twice yields the same text as applying it once.
pub fn to_attribute_safe(text: &str) -> String {
    if looks_escaped(text) {
        return text.to_string();
    }
    escape_attribute(text)
}

/// Escape serialized JSON so it can be embedded in an attribute value.
///
/// `'` is left alone: JSON never delimits with apostrophes.
pub fn to_json_in_attribute(json: &str) -> String {
    escape_with(json, json_entity)
}

/// Decode the predefined XML entities and numeric character references in a
/// single left-to-right pass. Unrecognised `&...;` sequences are kept as-is.
pub fn from_attribute_safe(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match entity_at(tail) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// True when `text` contains at least one entity, every `&` starts a
/// recognised entity, and no raw character that would need escaping remains.
pub fn looks_escaped(text: &str) -> bool {
    let mut saw_entity = false;
    let mut rest = text;
    while let Some(pos) = rest.find(['&', '<', '>', '"', '\'', '\n']) {
        let tail = &rest[pos..];
        if !tail.starts_with('&') {
            return false;
        }
        match entity_at(tail) {
            Some((_, len)) => {
                saw_entity = true;
                rest = &tail[len..];
            }
            None => return false,
        }
    }
    saw_entity
}

/// Parse an entity at the start of `s` (which begins with `&`).
/// Returns the decoded character and the byte length consumed.
fn entity_at(s: &str) -> Option<(char, usize)> {
    // Longest form we accept is `&#x10FFFF;`.
    let end = s.char_indices().take(11).find(|&(_, c)| c == ';')?.0;
    let body = &s[1..end];
    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let digits = body.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
                Some(_) => return None,
                None if !digits.is_empty() => digits.parse::<u32>().ok()?,
                None => return None,
            };
            char::from_u32(code)?
        }
    };
    Some((ch, end + 1))
}
