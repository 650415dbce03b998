//! Rendered-document seam for the preference store.
//!
//! The store never touches a concrete DOM. It writes through `Document`
//! and asks `ColorScheme` for the OS preference. `HeadlessDocument` keeps
//! the root element in memory for the CLI and tests.

use std::sync::{Mutex, PoisonError};

use crate::preference::{Direction, Preference, ResolvedTheme};

/// The document root element.
pub trait Document: Send + Sync {
    /// Replace any theme class with `theme`; at most one is ever present.
    fn set_theme_class(&self, theme: ResolvedTheme);

    /// Write the root `dir` attribute.
    fn set_direction(&self, direction: Direction);
}

/// OS/browser color-scheme query, read once per apply.
pub trait ColorScheme: Send + Sync {
    fn prefers_dark(&self) -> bool;
}

/// A color-scheme answer fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedColorScheme {
    pub prefers_dark: bool,
}

impl ColorScheme for FixedColorScheme {
    fn prefers_dark(&self) -> bool {
        self.prefers_dark
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RootElement {
    classes: Vec<String>,
    dir: Option<Direction>,
}

/// In-memory document root.
#[derive(Debug, Default)]
pub struct HeadlessDocument {
    root: Mutex<RootElement>,
}

impl HeadlessDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Root with pre-existing classes, e.g. from a server-rendered shell.
    #[must_use]
    pub fn with_classes(classes: &[&str]) -> Self {
        let root = RootElement { classes: classes.iter().map(|c| (*c).to_owned()).collect(), dir: None };
        Self { root: Mutex::new(root) }
    }

    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        self.lock().classes.clone()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.lock().classes.iter().any(|c| c == class)
    }

    #[must_use]
    pub fn dir(&self) -> Option<Direction> {
        self.lock().dir
    }

    /// Root element attributes as they would be serialized.
    #[must_use]
    pub fn root_attributes(&self) -> String {
        let root = self.lock();
        let dir = root.dir.map_or("", |d| d.as_str());
        format!(r#"class="{}" dir="{dir}""#, root.classes.join(" "))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RootElement> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Document for HeadlessDocument {
    fn set_theme_class(&self, theme: ResolvedTheme) {
        let mut root = self.lock();
        root.classes
            .retain(|c| !ResolvedTheme::ALL.iter().any(|t| t.class_name() == c));
        root.classes.push(theme.class_name().to_owned());
    }

    fn set_direction(&self, direction: Direction) {
        self.lock().dir = Some(direction);
    }
}
