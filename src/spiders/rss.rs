//! Minimal RSS 2.0 item extraction.
//!
//! Feeds are scanned with regexes rather than a full XML parser: only the
//! `<item>` children we store are read, CDATA sections are kept verbatim and
//! XML entities elsewhere are decoded.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item\b[^>]*>(.*?)</item\s*>").expect("valid regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>(.*?)</link\s*>").expect("valid regex"));
static PUB_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pubDate\b[^>]*>(.*?)</pubDate\s*>").expect("valid regex"));
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<description\b[^>]*>(.*?)</description\s*>").expect("valid regex")
});
static CDATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct RssEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
}

pub fn parse_feed(xml: &str) -> Vec<RssEntry> {
    ITEM_RE
        .captures_iter(xml)
        .map(|item| {
            let body = &item[1];
            RssEntry {
                title: field(&TITLE_RE, body),
                link: field(&LINK_RE, body),
                published: parse_pub_date(&field(&PUB_DATE_RE, body)),
                summary: field(&DESCRIPTION_RE, body),
            }
        })
        .collect()
}

fn field(re: &Regex, body: &str) -> String {
    re.captures(body)
        .map(|c| xml_text(&c[1]).trim().to_string())
        .unwrap_or_default()
}

/// Decode element content: CDATA verbatim, entities decoded everywhere else.
pub fn xml_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for cdata in CDATA_RE.captures_iter(raw) {
        let Some(whole) = cdata.get(0) else {
            continue;
        };
        out.push_str(&decode_entities(&raw[last..whole.start()]));
        out.push_str(&cdata[1]);
        last = whole.end();
    }
    out.push_str(&decode_entities(&raw[last..]));
    out
}

pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// RFC 2822 dates as used by `pubDate`, converted to UTC.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
