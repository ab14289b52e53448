//! Filenames appended to user-facing download URLs.

const NAME_MAX: usize = 255;

/// Sanitizes a display name before it goes into a `filename` query parameter.
///
/// - Replaces `/`, `\`, control characters and `< > : " | ? * # % &` with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 255 bytes
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_download_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let reserved = matches!(
            c,
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' | '#' | '%' | '&'
        );
        let replacement = if reserved || c.is_control() { '_' } else { c };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return None;
    }

    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    Some(trimmed[..take].to_string())
}

/// Appends `filename=<sanitized name>` to `url`. Unparseable URLs and
/// unusable names leave the URL untouched.
pub fn with_filename(url: &str, name: Option<&str>) -> String {
    let Some(clean) = name.and_then(sanitize_download_name) else {
        return url.to_string();
    };
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("filename", &clean);
            parsed.into()
        }
        Err(_) => url.to_string(),
    }
}
