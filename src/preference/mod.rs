//! Preference model: theme mode and text direction.
//!
//! DESIGN
//! ======
//! Both preferences are closed enumerations with a lowercase wire literal.
//! The same literal is used in JSON bodies, cookie values and the `dir`
//! attribute, so every enum carries `as_str`/`parse` plus serde renames.
//! The `Preference` trait lets the cookie codec and the HTTP endpoints treat
//! the two kinds generically.

pub mod cookie;

use serde::{Deserialize, Serialize};

// =============================================================================
// PREFERENCE TRAIT
// =============================================================================

/// A user preference that round-trips through a cookie and a JSON field.
pub trait Preference: Copy + Send + Sync + 'static {
    /// Cookie name holding the durable value.
    const COOKIE_NAME: &'static str;
    /// JSON field name used by the endpoint body and acknowledgement.
    const FIELD: &'static str;
    /// Value used when the cookie is absent or malformed.
    const DEFAULT: Self;
    /// Human-readable list of accepted literals for validation errors.
    const ACCEPTED: &'static str;

    fn as_str(self) -> &'static str;

    /// Strict parse of the wire literal. Anything else is `None`.
    fn parse(raw: &str) -> Option<Self>;
}

// =============================================================================
// THEME MODE
// =============================================================================

/// Requested appearance. `System` defers to the OS color scheme at apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Dark,
    Light,
    System,
}

impl ThemeMode {
    /// Resolve to a concrete class. Evaluated once per call; `System` does not
    /// track later OS changes.
    #[must_use]
    pub fn resolve(self, prefers_dark: bool) -> ResolvedTheme {
        match self {
            Self::Dark => ResolvedTheme::Dark,
            Self::Light => ResolvedTheme::Light,
            Self::System if prefers_dark => ResolvedTheme::Dark,
            Self::System => ResolvedTheme::Light,
        }
    }
}

impl Preference for ThemeMode {
    const COOKIE_NAME: &'static str = "qpmatrix-theme";
    const FIELD: &'static str = "theme";
    const DEFAULT: Self = Self::System;
    const ACCEPTED: &'static str = r#""dark", "light", or "system""#;

    fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::System => "system",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete appearance written to the document root as a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedTheme {
    Dark,
    Light,
}

impl ResolvedTheme {
    /// Every class the store may write; applying one removes the others.
    pub const ALL: [Self; 2] = [Self::Light, Self::Dark];

    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Text flow direction applied as the root `dir` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Preference for Direction {
    const COOKIE_NAME: &'static str = "qpmatrix-direction";
    const FIELD: &'static str = "direction";
    const DEFAULT: Self = Self::Ltr;
    const ACCEPTED: &'static str = r#""rtl" or "ltr""#;

    fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ltr" => Some(Self::Ltr),
            "rtl" => Some(Self::Rtl),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PREFERENCE STATE
// =============================================================================

/// The pair of preferences held for one page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceState {
    pub theme: ThemeMode,
    pub direction: Direction,
}

impl Default for PreferenceState {
    fn default() -> Self {
        Self { theme: ThemeMode::DEFAULT, direction: Direction::DEFAULT }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
