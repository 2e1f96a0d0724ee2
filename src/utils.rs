//! Utility functions for identifiers, file names and response flattening

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Extract a local file name from a remote file URI
///
/// Uses the last non-empty path segment of the URI, percent-decoded. Falls
/// back to a plain split on `/` for strings that are not valid URLs, and to
/// `"download"` as a last resort.
///
/// # Examples
///
/// ```
/// use factiva_news::utils::file_name_from_uri;
///
/// assert_eq!(
///     file_name_from_uri("https://files.example.com/snap/part-00000.avro?sig=abc"),
///     "part-00000.avro"
/// );
/// assert_eq!(file_name_from_uri("gs://bucket/a%20b.json"), "a b.json");
/// // Encoded separators never leave the target directory
/// assert_eq!(file_name_from_uri("https://files.example.com/snap/..%2F..%2Fevil.txt"), "evil.txt");
/// ```
pub fn file_name_from_uri(uri: &str) -> String {
    if let Ok(parsed) = url::Url::parse(uri) {
        let last_segment = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back());
        return match last_segment {
            Some(segment) => match urlencoding::decode(segment) {
                Ok(decoded) => sanitize_file_name(&decoded),
                Err(_) => sanitize_file_name(segment),
            },
            None => "download".to_string(),
        };
    }

    // Not a URL: take whatever follows the final slash
    uri.split(['?', '#'])
        .next()
        .unwrap_or(uri)
        .rsplit('/')
        .find(|s| !s.is_empty())
        .map(sanitize_file_name)
        .unwrap_or_else(|| "download".to_string())
}

/// Reduce a decoded segment to a bare file name
///
/// Decoded separators (`%2F`, `%5C`) would otherwise let the name climb out
/// of the download directory.
fn sanitize_file_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    match Path::new(&name).file_name().and_then(|n| n.to_str()) {
        Some(file_name) if !matches!(file_name, "" | "." | "..") => file_name.to_string(),
        _ => "download".to_string(),
    }
}

/// Derive the owning stream id from a subscription id
///
/// Subscription ids are the stream id followed by two dash-delimited
/// segments (`{streamId}-filtered-{suffix}`).
///
/// # Examples
///
/// ```
/// use factiva_news::utils::stream_id_from_subscription;
///
/// assert_eq!(
///     stream_id_from_subscription("dj-synhub-stream-key-abc-filtered-1a2b"),
///     "dj-synhub-stream-key-abc"
/// );
/// ```
#[must_use]
pub fn stream_id_from_subscription(subscription_id: &str) -> String {
    let parts: Vec<&str> = subscription_id.split('-').collect();
    let keep = parts.len().saturating_sub(2);
    parts[..keep].join("-")
}

/// Flatten nested JSON objects into dotted keys
///
/// Arrays and scalars are kept as leaf values.
#[must_use]
pub fn flatten_json(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let next = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, next, out);
            }
        }
        other => {
            out.insert(prefix, other.clone());
        }
    }
}
