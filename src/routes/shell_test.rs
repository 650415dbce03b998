use super::*;
use crate::preference::{Direction, ThemeMode};
use crate::routes::test_helpers::spawn_app;

/// Replay the `name=value` pair of a `Set-Cookie` header as a `Cookie` header.
fn cookie_pair(resp: &reqwest::Response) -> String {
    let raw = resp.headers().get(reqwest::header::SET_COOKIE).unwrap().to_str().unwrap();
    raw.split(';').next().unwrap().to_owned()
}

fn root_tag(html: &str) -> &str {
    let start = html.find("<html").expect("html tag");
    let end = html[start..].find('>').expect("tag end") + start;
    &html[start..=end]
}

#[test]
fn render_document_writes_root_attributes() {
    let state = PreferenceState { theme: ThemeMode::System, direction: Direction::Rtl };
    let html = render_document(state, ResolvedTheme::Dark);
    assert_eq!(
        root_tag(&html),
        r#"<html lang="en" class="dark" dir="rtl" data-theme="system">"#
    );
}

#[test]
fn hint_parses_quoted_value() {
    let mut headers = HeaderMap::new();
    headers.insert(COLOR_SCHEME_HINT, HeaderValue::from_static("\"dark\""));
    assert!(hint_prefers_dark(&headers));
    headers.insert(COLOR_SCHEME_HINT, HeaderValue::from_static("light"));
    assert!(!hint_prefers_dark(&headers));
    assert!(!hint_prefers_dark(&HeaderMap::new()));
}

#[tokio::test]
async fn reload_after_setting_dark_renders_dark_root() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/theme"))
        .json(&serde_json::json!({ "theme": "dark" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let cookie = cookie_pair(&resp);

    let html = client
        .get(format!("{base}/"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let tag = root_tag(&html);
    assert!(tag.contains(r#"class="dark""#), "{tag}");
    assert!(!tag.contains("light"), "{tag}");
}

#[tokio::test]
async fn reload_after_setting_rtl_renders_dir() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/theme/direction"))
        .json(&serde_json::json!({ "direction": "rtl" }))
        .send()
        .await
        .unwrap();
    let cookie = cookie_pair(&resp);

    let html = client
        .get(format!("{base}/"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(root_tag(&html).contains(r#"dir="rtl""#));
}

#[tokio::test]
async fn system_theme_uses_client_hint() {
    let base = spawn_app().await;
    let html = reqwest::Client::new()
        .get(format!("{base}/"))
        .header("Sec-CH-Prefers-Color-Scheme", "\"dark\"")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let tag = root_tag(&html);
    assert!(tag.contains(r#"class="dark""#));
    assert!(tag.contains(r#"data-theme="system""#));
}

#[tokio::test]
async fn no_cookie_renders_light_ltr() {
    let base = spawn_app().await;
    let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
    assert_eq!(
        root_tag(&html),
        r#"<html lang="en" class="light" dir="ltr" data-theme="system">"#
    );
}
