//! Cookie codec for preference values.
//!
//! Pure translation between a raw `Cookie` request header and typed
//! preferences, and between a preference and its `Set-Cookie` value.
//!
//! ERROR HANDLING
//! ==============
//! Decoding never fails. A missing header, a missing cookie or an unknown
//! value all decode to the preference default so a bad cookie can never
//! break a page load.

use super::{Direction, Preference, PreferenceState, ThemeMode};

/// One year, in seconds.
pub const COOKIE_MAX_AGE_SECS: u64 = 31_536_000;

/// Decode a preference from a raw `Cookie` header.
///
/// Segments are split on `;` and trimmed; the first segment starting with
/// `<name>=` is selected and its value is the text up to the next `=`.
#[must_use]
pub fn parse_cookie<P: Preference>(header: Option<&str>) -> P {
    let Some(header) = header.filter(|h| !h.is_empty()) else {
        return P::DEFAULT;
    };

    let prefix = format!("{}=", P::COOKIE_NAME);
    header
        .split(';')
        .map(str::trim)
        .find(|segment| segment.starts_with(&prefix))
        .and_then(|segment| segment.split('=').nth(1))
        .and_then(P::parse)
        .unwrap_or(P::DEFAULT)
}

/// Encode a preference as a `Set-Cookie` header value.
#[must_use]
pub fn serialize_cookie<P: Preference>(value: P) -> String {
    format!(
        "{}={}; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}; SameSite=Lax",
        P::COOKIE_NAME,
        value.as_str()
    )
}

#[must_use]
pub fn parse_theme(header: Option<&str>) -> ThemeMode {
    parse_cookie(header)
}

#[must_use]
pub fn parse_direction(header: Option<&str>) -> Direction {
    parse_cookie(header)
}

#[must_use]
pub fn serialize_theme(value: ThemeMode) -> String {
    serialize_cookie(value)
}

#[must_use]
pub fn serialize_direction(value: Direction) -> String {
    serialize_cookie(value)
}

/// Decode both preferences; used to seed a page from request cookies.
#[must_use]
pub fn parse_preferences(header: Option<&str>) -> PreferenceState {
    PreferenceState { theme: parse_theme(header), direction: parse_direction(header) }
}

#[cfg(test)]
#[path = "cookie_test.rs"]
mod tests;
