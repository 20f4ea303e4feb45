use anyhow::Result;
use reqwest::Url;
use tracing::{debug, info, warn};

use super::{rss, JobArgs};
use crate::config::Settings;
use crate::engine::{Output, Request, Response, Spider};
use crate::error::ScrapeError;
use crate::items::{NewsItem, ScrapedItem};
use crate::text::{selector_text, truncate_words};

pub const NAME: &str = "yahoo_news_rss";
pub const SOURCE: &str = "YahooFinanceRSS";
const ARTICLE_SELECTOR: &str = "div.caas-body";
const MAX_ARTICLE_WORDS: usize = 2000;

#[derive(Debug)]
pub enum YahooCallback {
    Feed,
    /// Headline fields read from the feed, waiting for the article body.
    Article(Box<NewsItem>),
}

/// Headlines for one ticker from Yahoo Finance's RSS feed, each followed to
/// its article page.
#[derive(Debug)]
pub struct YahooNewsRss {
    ticker: String,
    feed_url: String,
}

impl YahooNewsRss {
    pub fn from_args(args: &JobArgs, settings: &Settings) -> Result<Self> {
        let ticker = args
            .get("ticker")
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScrapeError::InvalidArgument("provide -a ticker=SYMBOL".to_string()))?;

        let feed_url = Url::parse_with_params(
            &settings.yahoo_rss_url,
            &[("s", ticker.as_str()), ("region", "US"), ("lang", "en-US")],
        )
        .map_err(|e| ScrapeError::invalid_setting("YAHOO_RSS_URL", e.to_string()))?;

        info!("Initialized Yahoo News job - Ticker: {}", ticker);
        Ok(Self {
            ticker,
            feed_url: feed_url.to_string(),
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    fn parse_feed(&self, response: &Response) -> Vec<Output<YahooCallback>> {
        let entries = rss::parse_feed(&response.text());
        info!("Found {} feed entries for {}", entries.len(), self.ticker);
        if entries.is_empty() {
            warn!("No entries in feed {}", response.url);
        }

        let mut outputs = Vec::new();
        for entry in entries {
            if entry.link.is_empty() {
                debug!("Skipping feed entry without link: {}", entry.title);
                continue;
            }
            let headline = NewsItem {
                ticker: self.ticker.clone(),
                source: SOURCE.to_string(),
                title: entry.title,
                link: entry.link.clone(),
                published: entry.published,
                summary: entry.summary,
                article_text: String::new(),
                sentiment: None,
            };
            match response.follow(&entry.link, YahooCallback::Article(Box::new(headline))) {
                Ok(request) => outputs.push(Output::Request(request)),
                Err(err) => warn!("Skipping feed entry: {:#}", err),
            }
        }
        outputs
    }
}

fn parse_article(response: &Response, mut item: NewsItem) -> Output<YahooCallback> {
    let body = selector_text(&response.text(), ARTICLE_SELECTOR).unwrap_or_default();
    if body.is_empty() {
        debug!("No article body found at {}", response.url);
    }
    item.article_text = truncate_words(&body, MAX_ARTICLE_WORDS);
    Output::Item(ScrapedItem::News(item))
}

impl Spider for YahooNewsRss {
    type Callback = YahooCallback;

    fn name(&self) -> &'static str {
        NAME
    }

    fn start_requests(&self) -> Result<Vec<Request<YahooCallback>>> {
        Ok(vec![Request::get(&self.feed_url, YahooCallback::Feed)?])
    }

    fn parse(
        &self,
        response: &Response,
        callback: YahooCallback,
    ) -> Result<Vec<Output<YahooCallback>>> {
        match callback {
            YahooCallback::Feed => Ok(self.parse_feed(response)),
            YahooCallback::Article(item) => Ok(vec![parse_article(response, *item)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn args(pairs: &[(&str, &str)]) -> JobArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn response(url: &str, body: &str) -> Response {
        Response {
            url: Url::parse(url).unwrap(),
            status: 200,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn ticker_is_required_and_upper_cased() {
        let settings = Settings::default();
        let err = YahooNewsRss::from_args(&args(&[]), &settings).unwrap_err();
        assert!(err.to_string().contains("provide -a ticker=SYMBOL"));

        let job = YahooNewsRss::from_args(&args(&[("ticker", "aapl")]), &settings).unwrap();
        assert_eq!(job.ticker(), "AAPL");
        assert_eq!(
            job.feed_url(),
            "https://feeds.finance.yahoo.com/rss/2.0/headline?s=AAPL&region=US&lang=en-US"
        );
    }

    #[test]
    fn feed_entries_become_article_requests() {
        let job = YahooNewsRss::from_args(&args(&[("ticker", "AAPL")]), &Settings::default())
            .unwrap();
        let feed = r#"<rss><channel>
            <item><title>One</title><link>https://finance.yahoo.com/news/one.html</link>
              <pubDate>Mon, 02 Dec 2024 08:00:00 GMT</pubDate><description>first</description></item>
            <item><title>No link</title></item>
            <item><title>Two</title><link>/news/two.html</link></item>
        </channel></rss>"#;
        let resp = response(job.feed_url(), feed);

        let outputs = job.parse(&resp, YahooCallback::Feed).unwrap();
        assert_eq!(outputs.len(), 2);
        let Output::Request(first) = &outputs[0] else {
            panic!("expected a request");
        };
        assert_eq!(first.url.as_str(), "https://finance.yahoo.com/news/one.html");
        let YahooCallback::Article(meta) = &first.callback else {
            panic!("expected an article callback");
        };
        assert_eq!(meta.title, "One");
        assert_eq!(meta.source, "YahooFinanceRSS");
        assert!(meta.published.is_some());

        let Output::Request(second) = &outputs[1] else {
            panic!("expected a request");
        };
        assert_eq!(second.url.as_str(), "https://feeds.finance.yahoo.com/news/two.html");
    }

    #[test]
    fn article_body_is_extracted_and_truncated() {
        let job = YahooNewsRss::from_args(&args(&[("ticker", "AAPL")]), &Settings::default())
            .unwrap();
        let words = vec!["word"; 2500].join(" ");
        let html = format!(
            "<html><body><nav>Menu</nav><div class=\"caas-body\"><p>{}</p></div></body></html>",
            words
        );
        let headline = NewsItem {
            ticker: "AAPL".to_string(),
            link: "https://finance.yahoo.com/news/one.html".to_string(),
            ..Default::default()
        };
        let resp = response("https://finance.yahoo.com/news/one.html", &html);

        let outputs = job
            .parse(&resp, YahooCallback::Article(Box::new(headline)))
            .unwrap();
        let Output::Item(ScrapedItem::News(item)) = &outputs[0] else {
            panic!("expected a news item");
        };
        assert_eq!(item.article_text.split(' ').count(), 2000);
        assert!(!item.article_text.contains("Menu"));
    }

    #[test]
    fn missing_article_body_yields_empty_text() {
        let job = YahooNewsRss::from_args(&args(&[("ticker", "AAPL")]), &Settings::default())
            .unwrap();
        let resp = response("https://finance.yahoo.com/news/x.html", "<p>paywall</p>");
        let outputs = job
            .parse(&resp, YahooCallback::Article(Box::default()))
            .unwrap();
        let Output::Item(ScrapedItem::News(item)) = &outputs[0] else {
            panic!("expected a news item");
        };
        assert_eq!(item.article_text, "");
    }
}
