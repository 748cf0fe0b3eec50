use crate::types::Headers;

/// Parses a `Name: value` header block into a lowercase-keyed map.
///
/// Each line is split at its first colon only, so values such as URLs or
/// cookie expiry dates survive intact. Absent or empty input yields an empty
/// map. Repeated names are joined with `", "`.
pub fn parse_headers<'a>(raw: impl Into<Option<&'a str>>) -> Headers {
    let mut headers = Headers::new();
    let Some(raw) = raw.into() else {
        return headers;
    };

    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let value = value.trim();
        headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    headers
}
