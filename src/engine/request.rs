use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::Url;
use std::borrow::Cow;

use crate::items::ScrapedItem;

/// A GET request scheduled by a job. `C` is the job's callback type and
/// carries whatever the follow-up parse step needs.
#[derive(Debug, Clone)]
pub struct Request<C> {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub callback: C,
    pub dont_filter: bool,
}

impl<C> Request<C> {
    pub fn get(url: &str, callback: C) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid request URL: {}", url))?;
        Ok(Self {
            url,
            headers: Vec::new(),
            callback,
            dont_filter: false,
        })
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Skip the duplicate filter for this request.
    pub fn dont_filter(mut self) -> Self {
        self.dont_filter = true;
        self
    }

    /// Key used by the duplicate filter. Fragments never reach the server,
    /// so they are ignored.
    pub fn fingerprint(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("GET {}", url)
    }
}

/// A downloaded page handed to a job callback.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .with_context(|| format!("Failed to parse JSON from {}", self.url))
    }

    /// Build a request for `href`, resolved against this response's URL.
    pub fn follow<C>(&self, href: &str, callback: C) -> Result<Request<C>> {
        let url = self
            .url
            .join(href.trim())
            .with_context(|| format!("Invalid link {} on {}", href, self.url))?;
        Ok(Request {
            url,
            headers: Vec::new(),
            callback,
            dont_filter: false,
        })
    }
}

/// What a job callback produces.
#[derive(Debug)]
pub enum Output<C> {
    Request(Request<C>),
    Item(ScrapedItem),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str) -> Response {
        Response {
            url: Url::parse(url).unwrap(),
            status: 200,
            headers: HeaderMap::new(),
            body: b"{\"ok\": true}".to_vec(),
        }
    }

    #[test]
    fn follow_resolves_relative_links() {
        let resp = response("https://www.sec.gov/Archives/edgar/data/320193/");
        let req = resp.follow("000032019324000123/aapl.htm", ()).unwrap();
        assert_eq!(
            req.url.as_str(),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/aapl.htm"
        );
        assert!(!req.dont_filter);

        let abs = resp.follow(" https://finance.yahoo.com/news/x.html ", ()).unwrap();
        assert_eq!(abs.url.as_str(), "https://finance.yahoo.com/news/x.html");
    }

    #[test]
    fn fingerprint_ignores_fragment() {
        let a = Request::get("https://example.com/a?x=1#top", ()).unwrap();
        let b = Request::get("https://example.com/a?x=1", ()).unwrap();
        let c = Request::get("https://example.com/a?x=2", ()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn json_body_decodes() {
        let value: serde_json::Value = response("https://data.sec.gov/x.json").json().unwrap();
        assert_eq!(value["ok"], true);
    }
}
