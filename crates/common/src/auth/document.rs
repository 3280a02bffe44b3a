//! Landed page documents
//!
//! The loader and the login flows only ask a handful of questions of a page:
//! its URL, whether a `<meta content=..>` marker is present, the value of a
//! named `<input>`, and the first link with a given prefix. [`PageDocument`]
//! is that surface; [`HtmlDocument`] answers it from an HTML snapshot.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Read-only view of a page landed in an isolated browsing context
pub trait PageDocument: Send + Sync {
    /// URL the context ended up on, fragment included
    fn url(&self) -> &str;

    /// Whether any `<meta>` element carries `content="{content}"`
    fn has_meta_content(&self, content: &str) -> bool;

    /// Value of the first `<input name="{name}">`
    fn input_value(&self, name: &str) -> Option<String>;

    /// `href` of the first `<a>` whose link starts with `prefix`
    fn link_with_prefix(&self, prefix: &str) -> Option<String>;

    /// Whether the page belongs to one of the given provider page families
    fn has_any_meta_content(&self, markers: &[&str]) -> bool {
        markers.iter().any(|m| self.has_meta_content(m))
    }
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(meta|input|a)\b([^>]*)>").expect("TAG_RE should compile - this is a bug")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("ATTR_RE should compile - this is a bug")
});

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: HashMap<String, String>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn parse_elements(html: &str) -> Vec<Element> {
    TAG_RE
        .captures_iter(html)
        .map(|tag| {
            let attributes = ATTR_RE
                .captures_iter(&tag[2])
                .filter_map(|attr| {
                    let name = attr.get(1)?.as_str().to_ascii_lowercase();
                    let value = attr.get(2).or_else(|| attr.get(3)).or_else(|| attr.get(4))?;
                    Some((name, decode_entities(value.as_str())))
                })
                .collect();
            Element { tag: tag[1].to_ascii_lowercase(), attributes }
        })
        .collect()
}

/// Snapshot of a landed HTML page
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    url: String,
    elements: Vec<Element>,
}

impl HtmlDocument {
    /// Parse the elements the portal cares about out of `html`
    #[must_use]
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        Self { url: url.into(), elements: parse_elements(html) }
    }

    fn elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements.iter().filter(move |e| e.tag == tag)
    }
}

impl PageDocument for HtmlDocument {
    fn url(&self) -> &str {
        &self.url
    }

    fn has_meta_content(&self, content: &str) -> bool {
        self.elements("meta").any(|e| e.attr("content") == Some(content))
    }

    fn input_value(&self, name: &str) -> Option<String> {
        self.elements("input")
            .find(|e| e.attr("name") == Some(name))
            .map(|e| e.attr("value").unwrap_or_default().to_string())
    }

    fn link_with_prefix(&self, prefix: &str) -> Option<String> {
        self.elements("a")
            .filter_map(|e| e.attr("href"))
            .find(|href| href.starts_with(prefix))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::document.
    use super::*;

    const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <META name="description" CONTENT="Guidewire">
  <meta charset='utf-8'>
</head>
<body>
  <form action="/login.do" method="post">
    <input type="hidden" name="X-Uaa-Csrf" value="csrf-token-123"/>
    <input name="username" type="text">
  </form>
  <a href="/forgot_password">Reset</a>
  <a class="idp" href="https://accounts.google.com/o/oauth2/auth?client_id=a&amp;state=b">Google</a>
</body>
</html>"#;

    /// Validates marker detection regardless of attribute case.
    ///
    /// Assertions:
    /// - Ensures the `Guidewire` marker is found.
    /// - Ensures an absent marker is not found.
    #[test]
    fn test_meta_markers() {
        let doc = HtmlDocument::parse("https://idp.example/login", LOGIN_PAGE);

        assert!(doc.has_meta_content("Guidewire"));
        assert!(!doc.has_meta_content("Cloud Foundry"));
        assert!(doc.has_any_meta_content(&["Cloud Foundry", "Guidewire"]));
    }

    /// Validates input lookup.
    ///
    /// Assertions:
    /// - Confirms the hidden CSRF input value is read.
    /// - An input without a value yields an empty string.
    /// - A missing input yields `None`.
    #[test]
    fn test_input_value() {
        let doc = HtmlDocument::parse("https://idp.example/login", LOGIN_PAGE);

        assert_eq!(doc.input_value("X-Uaa-Csrf").as_deref(), Some("csrf-token-123"));
        assert_eq!(doc.input_value("username").as_deref(), Some(""));
        assert_eq!(doc.input_value("password"), None);
    }

    /// Validates prefixed link lookup with entity decoding.
    ///
    /// Assertions:
    /// - Confirms the Google link is found and `&amp;` is decoded.
    #[test]
    fn test_link_with_prefix() {
        let doc = HtmlDocument::parse("https://idp.example/login", LOGIN_PAGE);

        assert_eq!(
            doc.link_with_prefix("https://accounts.google.com/o/oauth2").as_deref(),
            Some("https://accounts.google.com/o/oauth2/auth?client_id=a&state=b")
        );
        assert_eq!(doc.link_with_prefix("https://login.example"), None);
    }
}
