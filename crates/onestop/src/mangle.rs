//! Name normalization for the name component of Onestop identifiers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::types::EntityKind;

/// Roadway words dropped from stop names before character replacement.
const STREET_ABBREVIATIONS: &[&str] = &[
    "street", "st", "sts", "ctr", "center", "drive", "dr", "ave", "avenue", "av", "boulevard",
    "blvd", "road", "rd", "alley", "aly", "way", "parkway", "pkwy", "lane", "ln", "hwy", "court",
    "ct",
];

static STREET_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", STREET_ABBREVIATIONS.join("|")))
        .expect("street abbreviation pattern is valid")
});

// `:`, `&`, `@` and `/` become the separator
static SEPARATOR_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:&@/]").expect("separator pattern is valid"));

static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^~0-9a-z]+").expect("disallowed pattern is valid"));

/// Mangle a display name into an identifier-safe token.
///
/// The output only contains ASCII lowercase letters, digits and `~`.
pub fn mangle(name: &str, kind: EntityKind) -> String {
    let lowered = name.to_lowercase();
    let stripped = match kind {
        EntityKind::Stop => STREET_WORDS.replace_all(&lowered, ""),
        _ => lowered.as_str().into(),
    };
    let separated = SEPARATOR_CHARS.replace_all(&stripped, "~");
    DISALLOWED_CHARS.replace_all(&separated, "").into_owned()
}
