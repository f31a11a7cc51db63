//! Markup scrape loader
//!
//! Fetches the site's root document and looks for an explicit icon
//! reference. A structured parse runs first; a line-oriented pattern match
//! over the raw text catches references the parser cannot see (inline
//! scripts, badly broken markup).

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::IconLoader;
use crate::config::ResolverConfig;
use crate::errors::LoaderError;
use crate::models::{ResolveContext, Target};
use crate::utils::{UpstreamScheme, read_capped};

/// `rel` tokens that mark a `<link>` as an icon reference.
/// `icon` also covers the legacy `shortcut icon` pair.
const ICON_REL_TOKENS: &[&str] = &["icon", "favicon", "apple-touch-icon"];

pub struct MarkupScrapeLoader {
    client: Client,
    scheme: UpstreamScheme,
    timeout: Duration,
    max_document_size: usize,
}

impl MarkupScrapeLoader {
    pub const NAME: &'static str = "scrape";

    pub fn new(client: Client, config: &ResolverConfig) -> Self {
        Self {
            client,
            scheme: UpstreamScheme::default(),
            timeout: config.scrape_timeout,
            max_document_size: config.max_document_size,
        }
    }

    pub fn with_scheme(mut self, scheme: UpstreamScheme) -> Self {
        self.scheme = scheme;
        self
    }

    async fn fetch_document(&self, base: &Url) -> Result<String, LoaderError> {
        let response = self.client.get(base.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(LoaderError::RequestFailed {
                status: status.as_u16(),
            });
        }

        let body = read_capped(response, self.max_document_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl IconLoader for MarkupScrapeLoader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn resolve(&self, ctx: &ResolveContext, target: &Target) -> Result<Url, LoaderError> {
        let base = self.scheme.base_url(target);
        let document = ctx.within(self.timeout, self.fetch_document(&base)).await??;

        match find_icon_reference(&document, &base) {
            Some(url) => Ok(url),
            None => {
                debug!(
                    request_id = ctx.request_id(),
                    target = %target,
                    document_bytes = document.len(),
                    "No icon reference in root document"
                );
                Err(LoaderError::NotFound)
            }
        }
    }
}

/// First usable icon reference in `html`, resolved against `base`.
pub fn find_icon_reference(html: &str, base: &Url) -> Option<Url> {
    structured_reference(html, base).or_else(|| line_reference(html, base))
}

fn link_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("link[href]").unwrap())
}

fn favicon_href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']?([^"'\s>]*favicon[^"'\s>]*\.(?:png|ico|svg))"#).unwrap()
    })
}

fn is_icon_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| ICON_REL_TOKENS.iter().any(|t| token.eq_ignore_ascii_case(t)))
}

fn structured_reference(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    document.select(link_selector()).find_map(|link| {
        let element = link.value();
        let href = element.attr("href")?;
        let rel = element.attr("rel").unwrap_or_default();

        if is_icon_rel(rel) || href.contains("favicon.") {
            resolve_reference(base, href)
        } else {
            None
        }
    })
}

fn line_reference(html: &str, base: &Url) -> Option<Url> {
    html.lines()
        .filter(|line| line.contains("favicon."))
        .flat_map(|line| favicon_href_pattern().captures_iter(line))
        .find_map(|caps| resolve_reference(base, caps.get(1)?.as_str()))
}

/// Turn an href into an absolute URL on the same scheme as `base`.
///
/// Host-absolute and relative paths are joined onto `base`, `//host/path`
/// inherits its scheme, plaintext `http` is upgraded, and anything that is
/// not http(s) (`data:`, `javascript:`) is rejected.
pub fn resolve_reference(base: &Url, value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut url = base.join(value).ok()?;
    if url.scheme() == "http" {
        url.set_scheme(base.scheme()).ok()?;
    }
    (url.scheme() == "https" || url.scheme() == base.scheme()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::build_http_client;
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn example() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[rstest]
    #[case("/img/fav.png", "https://example.com/img/fav.png")]
    #[case("images/favicon.ico", "https://example.com/images/favicon.ico")]
    #[case("https://cdn.example.net/icon.png", "https://cdn.example.net/icon.png")]
    #[case("http://cdn.example.net/icon.png", "https://cdn.example.net/icon.png")]
    #[case("//static.example.org/favicon.ico", "https://static.example.org/favicon.ico")]
    #[case("  /padded.ico  ", "https://example.com/padded.ico")]
    fn test_resolve_reference(#[case] href: &str, #[case] expected: &str) {
        assert_eq!(resolve_reference(&example(), href).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("data:image/png;base64,iVBORw0KGgo=")]
    #[case("javascript:void(0)")]
    fn test_resolve_reference_rejects(#[case] href: &str) {
        assert!(resolve_reference(&example(), href).is_none());
    }

    #[test]
    fn test_finds_link_rel_icon() {
        let html = r#"<html><head><link rel="icon" href="/img/fav.png"></head></html>"#;
        let url = find_icon_reference(html, &example()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/img/fav.png");
    }

    #[test]
    fn test_absolute_href_passes_through() {
        let html = r#"<link rel="shortcut icon" href="https://cdn.example.net/a/b.ico">"#;
        let url = find_icon_reference(html, &example()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.net/a/b.ico");
    }

    #[test]
    fn test_first_match_in_document_order() {
        let html = r#"
            <head>
              <link rel="stylesheet" href="/site.css">
              <link rel="apple-touch-icon" href="/touch.png">
              <link rel="icon" href="/icon.png">
            </head>"#;
        let url = find_icon_reference(html, &example()).unwrap();
        assert_eq!(url.path(), "/touch.png");
    }

    #[test]
    fn test_favicon_href_without_icon_rel() {
        let html = r#"<link rel="preload" href="/static/favicon.svg">"#;
        let url = find_icon_reference(html, &example()).unwrap();
        assert_eq!(url.path(), "/static/favicon.svg");
    }

    #[test]
    fn test_skips_data_uri_and_continues() {
        let html = r#"
            <link rel="icon" href="data:image/x-icon;base64,AAAB">
            <link rel="icon" href="/real.ico">"#;
        let url = find_icon_reference(html, &example()).unwrap();
        assert_eq!(url.path(), "/real.ico");
    }

    #[test]
    fn test_line_fallback_finds_reference_in_script() {
        let html = "<html><body>\n<script>var tpl = '<a href=\"/static/favicon.png\">';</script>\n</body></html>";
        let url = find_icon_reference(html, &example()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/static/favicon.png");
    }

    #[test]
    fn test_no_reference() {
        let html = r#"<html><head><link rel="stylesheet" href="/main.css"></head><body>favicon</body></html>"#;
        assert!(find_icon_reference(html, &example()).is_none());
    }

    fn loader() -> MarkupScrapeLoader {
        let config = ResolverConfig::default();
        let client = build_http_client(&config).unwrap();
        MarkupScrapeLoader::new(client, &config).with_scheme(UpstreamScheme::Http)
    }

    fn target_for(server: &MockServer) -> Target {
        Target::normalize(&server.address().to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_against_mock_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><head><link rel="icon" href="/img/fav.png"></head></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let url = loader()
            .resolve(&ResolveContext::detached(), &target_for(&server))
            .await
            .unwrap();
        assert_eq!(url.as_str(), format!("{}/img/fav.png", server.uri()));
    }

    #[tokio::test]
    async fn test_non_ok_root_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = loader()
            .resolve(&ResolveContext::detached(), &target_for(&server))
            .await;
        assert!(matches!(result, Err(LoaderError::RequestFailed { status: 503 })));
    }

    #[tokio::test]
    async fn test_page_without_reference_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let result = loader()
            .resolve(&ResolveContext::detached(), &target_for(&server))
            .await;
        assert!(matches!(result, Err(LoaderError::NotFound)));
    }
}
