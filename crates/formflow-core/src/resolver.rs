//! Variable resolution: `{{path}}` template substitution.
//!
//! `resolve` scans a template for double-brace tokens, splits each path on
//! `.`, and walks the context segment by segment. A token is substituted with
//! the stringified leaf only when every segment resolves to a defined,
//! non-null value; otherwise the token text is left byte-identical in the
//! output. Resolution never fails: a miss is not an error, so
//! partially-configured templates stay visibly obvious instead of silently
//! becoming empty strings.
//!
//! Single-brace `{path}` / `${path}` tokens are a separate, narrower facility
//! used only for literal API URL path placeholders (`resolve_path_params`).
//!
//! This one primitive backs request URL/body construction, response-mapping
//! update paths, header content, confirmation prompts, and exit messages.

use serde_json::Value;

/// Resolve all `{{path}}` tokens in `template` against `context`.
pub fn resolve(template: &str, context: &Value) -> String {
    resolve_with(template, context, false)
}

/// `resolve`, but every substituted value has its single quotes doubled
/// before insertion (OData `$filter` literal escaping). The surrounding
/// template text is never escaped.
pub fn resolve_escaped(template: &str, context: &Value) -> String {
    resolve_with(template, context, true)
}

fn resolve_with(template: &str, context: &Value, escape_single_quotes: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            // Unterminated token: emit the remainder verbatim.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let token = &rest[start..start + 2 + end + 2];
        let path = after[..end].trim();
        match lookup_path(context, path) {
            Some(value) => {
                let mut text = value_to_string(value);
                if escape_single_quotes {
                    text = text.replace('\'', "''");
                }
                out.push_str(&text);
            }
            None => out.push_str(token),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Resolve single-brace `{path}` and `${path}` URL path placeholders.
///
/// Placeholders that miss are left untouched, like double-brace tokens.
/// A `{{` pair is never treated as a single-brace placeholder, so templates
/// mixing both styles resolve correctly when this runs after `resolve`.
pub fn resolve_path_params(url: &str, context: &Value) -> String {
    let mut out = String::with_capacity(url.len());
    let bytes = url.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let dollar = bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{');
        let brace_start = if dollar { i + 1 } else { i };
        let double = bytes.get(brace_start) == Some(&b'{') && bytes.get(brace_start + 1) == Some(&b'{');

        if bytes.get(brace_start) == Some(&b'{') && !double {
            if let Some(close) = url[brace_start + 1..].find('}') {
                let path = &url[brace_start + 1..brace_start + 1 + close];
                match lookup_path(context, path.trim()) {
                    Some(value) => out.push_str(&value_to_string(value)),
                    None => out.push_str(&url[i..brace_start + 1 + close + 1]),
                }
                i = brace_start + 1 + close + 1;
                continue;
            }
        }

        if double {
            // Skip over a {{token}} untouched
            if let Some(close) = url[brace_start + 2..].find("}}") {
                out.push_str(&url[i..brace_start + 2 + close + 2]);
                i = brace_start + 2 + close + 2;
                continue;
            }
        }

        let ch_len = url[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        out.push_str(&url[i..i + ch_len]);
        i += ch_len;
    }

    out
}

/// Walk a dotted path through a JSON value.
///
/// Returns `None` unless every segment resolves to a defined, non-null value;
/// partial matches never substitute.
pub fn lookup_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            // Numeric segments index into arrays (row references).
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Stringify a leaf value for substitution into a template.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        // Objects and arrays substitute as compact JSON
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
