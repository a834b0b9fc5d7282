//! Placeholder substitution for activity headlines.
//!
//! Placeholders look like `{Name}` or `{Name,modifier}`. `Name` may be a dotted
//! path into nested objects (`{Data.Name}`). Supported modifiers:
//!
//! | Modifier | Output |
//! |----------|--------|
//! | *(none)* | the value as text |
//! | `text`   | the value reduced to plain text |
//! | `url`    | the host's absolute URL for the value as a route |
//!
//! Braces that do not form a valid placeholder, and placeholders with other
//! modifiers, are copied verbatim. A valid placeholder naming a field that is
//! absent or null becomes an empty string.

use crate::host::Host;

/// Substitute every placeholder in `template` from `context`
pub fn format_string(template: &str, context: &serde_json::Value, host: &dyn Host) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        let Some(close) = after_open.find('}') else {
            result.push_str(&rest[open..]);
            return result;
        };

        let token = &after_open[..close];
        match substitute_token(token, context, host) {
            Some(replacement) => result.push_str(&replacement),
            None => {
                result.push('{');
                result.push_str(token);
                result.push('}');
            }
        }
        rest = &after_open[close + 1..];
    }

    result.push_str(rest);
    result
}

/// `None` means the token is not a placeholder we understand
fn substitute_token(token: &str, context: &serde_json::Value, host: &dyn Host) -> Option<String> {
    let (name, modifier) = match token.split_once(',') {
        Some((name, modifier)) => (name.trim(), Some(modifier.trim())),
        None => (token.trim(), None),
    };

    if !is_field_path(name) {
        return None;
    }

    let value = lookup(context, name).map(value_to_string).unwrap_or_default();

    match modifier {
        None => Some(value),
        Some("text") => Some(plain_text(&value)),
        Some("url") if value.is_empty() => Some(value),
        Some("url") => Some(host.canonical_url(&value)),
        Some(_) => None,
    }
}

fn is_field_path(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('.')
            .all(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'))
}

fn lookup<'a>(context: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(context, |value, segment| match value {
        serde_json::Value::Object(map) => map.get(segment),
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        // For arrays and objects, use JSON representation
        _ => value.to_string(),
    }
}

/// Reduce markup to plain text: line breaks become newlines, other tags are
/// dropped and common entities are decoded.
pub fn plain_text(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let tag_body = &rest[open + 1..];

        let starts_tag = tag_body
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        let close = tag_body.find('>');

        match (starts_tag, close) {
            (true, Some(close)) => {
                if is_line_break(&tag_body[..close]) {
                    text.push('\n');
                }
                rest = &tag_body[close + 1..];
            }
            _ => {
                text.push('<');
                rest = tag_body;
            }
        }
    }
    text.push_str(rest);

    decode_entities(&text).trim().to_string()
}

fn is_line_break(tag: &str) -> bool {
    let name = tag.trim_end_matches('/').trim();
    name.eq_ignore_ascii_case("br")
}

fn decode_entities(input: &str) -> String {
    let mut decoded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let entity = after
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));

        match entity {
            Some((c, end)) => {
                decoded.push(c);
                rest = &after[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = after;
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = name.strip_prefix('#')?;
            let number = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(number)
        }
    }
}
