use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Top-level shape of a JSON document, judged by its first significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Array,
    Object,
    Other,
}

pub fn json_shape(raw: &[u8]) -> JsonShape {
    match raw.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') => JsonShape::Array,
        Some(b'{') => JsonShape::Object,
        _ => JsonShape::Other,
    }
}

/// Decodes either one entity or an array of entities into a list.
///
/// Payloads that are neither an array nor an object (empty body, `null`,
/// scalars) yield an empty list rather than an error.
pub fn decode_collection<T: DeserializeOwned>(raw: &[u8]) -> Result<Vec<T>, serde_json::Error> {
    match json_shape(raw) {
        JsonShape::Array => serde_json::from_slice(raw),
        JsonShape::Object => Ok(vec![serde_json::from_slice(raw)?]),
        JsonShape::Other => Ok(Vec::new()),
    }
}

fn non_slug_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"))
}

pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let slug = non_slug_chars().replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug.to_string()
    }
}

/// Returns a slug for `name` not present in `taken`, and records it there.
pub fn next_unique_slug(name: &str, taken: &mut HashSet<String>) -> String {
    let base = slugify(name);
    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
