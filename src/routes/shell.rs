//! Document shell seeded from preference cookies.
//!
//! The root element is rendered with the decoded theme class and `dir`
//! attribute so a reload shows the persisted preference before any client
//! script runs. `system` is resolved from the color-scheme client hint when
//! the browser sends one, otherwise `light`.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::response::{Html, IntoResponse};

use crate::preference::cookie::parse_preferences;
use crate::preference::{Preference, PreferenceState, ResolvedTheme};

use super::preferences::cookie_header;

const COLOR_SCHEME_HINT: &str = "sec-ch-prefers-color-scheme";

/// `GET /`: minimal HTML document carrying the root attributes.
pub async fn document(headers: HeaderMap) -> impl IntoResponse {
    let state = parse_preferences(cookie_header(&headers).as_deref());
    let resolved = state.theme.resolve(hint_prefers_dark(&headers));

    (
        [
            (HeaderName::from_static("accept-ch"), HeaderValue::from_static("Sec-CH-Prefers-Color-Scheme")),
            (header::VARY, HeaderValue::from_static("Cookie, Sec-CH-Prefers-Color-Scheme")),
        ],
        Html(render_document(state, resolved)),
    )
}

pub(crate) fn hint_prefers_dark(headers: &HeaderMap) -> bool {
    headers
        .get(COLOR_SCHEME_HINT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().trim_matches('"').eq_ignore_ascii_case("dark"))
}

pub(crate) fn render_document(state: PreferenceState, resolved: ResolvedTheme) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\" class=\"{class}\" dir=\"{dir}\" data-theme=\"{mode}\">\n",
            "<head><meta charset=\"utf-8\"><title>qpmatrix</title></head>\n",
            "<body></body>\n",
            "</html>\n",
        ),
        class = resolved.class_name(),
        dir = state.direction.as_str(),
        mode = state.theme.as_str(),
    )
}

#[cfg(test)]
#[path = "shell_test.rs"]
mod tests;
