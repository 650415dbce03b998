//! Client side of the preference round trip.
//!
//! SYSTEM CONTEXT
//! ==============
//! `PreferenceStore` owns the live values and the document root. Writes go
//! through `ThemeService`, which speaks to the preference routes over the
//! retrying `HttpClient`.

pub mod document;
pub mod http;
pub mod store;
pub mod theme_service;

pub use document::{ColorScheme, Document, FixedColorScheme, HeadlessDocument};
pub use http::{ApiError, HttpClient, RequestMeta};
pub use store::{ErrorKind, PersistError, PersistHandle, PersistOutcome, PreferenceStore, StoreError};
pub use theme_service::{PreferenceAck, PreferencePersister, ThemeService};
