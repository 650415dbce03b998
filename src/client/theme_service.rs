//! Preference persistence over the internal HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{ApiError, HttpClient};
use crate::preference::{Direction, PreferenceState, ThemeMode};
use crate::routes::{DIRECTION_PATH, PREFERENCES_PATH, THEME_PATH};

/// Durable write of a single preference. Implemented by `ThemeService`;
/// the store only sees this seam.
#[async_trait]
pub trait PreferencePersister: Send + Sync {
    async fn persist_theme(&self, theme: ThemeMode) -> Result<(), ApiError>;

    async fn persist_direction(&self, direction: Direction) -> Result<(), ApiError>;
}

/// Acknowledgement body returned by the preference endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreferenceAck {
    pub success: bool,
    pub theme: Option<ThemeMode>,
    pub direction: Option<Direction>,
}

#[derive(Serialize)]
struct ThemeBody {
    theme: ThemeMode,
}

#[derive(Serialize)]
struct DirectionBody {
    direction: Direction,
}

#[derive(Clone)]
pub struct ThemeService {
    http: HttpClient,
}

impl ThemeService {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// `POST /api/theme`.
    ///
    /// # Errors
    ///
    /// Returns the normalized client error once retries are exhausted.
    pub async fn set_theme(&self, theme: ThemeMode) -> Result<PreferenceAck, ApiError> {
        self.http.post(THEME_PATH, &ThemeBody { theme }).await
    }

    /// `POST /api/theme/direction`.
    ///
    /// # Errors
    ///
    /// Returns the normalized client error once retries are exhausted.
    pub async fn set_direction(&self, direction: Direction) -> Result<PreferenceAck, ApiError> {
        self.http.post(DIRECTION_PATH, &DirectionBody { direction }).await
    }

    /// `GET /api/preferences`: what the server decodes from our cookies.
    ///
    /// # Errors
    ///
    /// Returns the normalized client error once retries are exhausted.
    pub async fn current(&self) -> Result<PreferenceState, ApiError> {
        self.http.get(PREFERENCES_PATH).await
    }
}

#[async_trait]
impl PreferencePersister for ThemeService {
    async fn persist_theme(&self, theme: ThemeMode) -> Result<(), ApiError> {
        self.set_theme(theme).await.map(|_| ())
    }

    async fn persist_direction(&self, direction: Direction) -> Result<(), ApiError> {
        self.set_direction(direction).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "theme_service_test.rs"]
mod tests;
