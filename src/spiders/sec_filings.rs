use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::JobArgs;
use crate::config::Settings;
use crate::engine::fetcher::build_client;
use crate::engine::{Output, Request, Response, Spider};
use crate::error::ScrapeError;
use crate::items::{ScrapedItem, SecFilingItem};
use crate::sec::{cik_from_value, pad_cik, resolve_cik, unpadded_cik};
use crate::text::{html_to_text, truncate_words};

pub const NAME: &str = "sec_filings";

/// Only these forms are followed to their primary document.
pub const RELEVANT_FORMS: &[&str] = &["10-K", "10-Q", "8-K"];
const MAX_REPORT_WORDS: usize = 4000;
const REPORT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug)]
pub enum SecCallback {
    Submissions,
    /// Filing metadata from the submissions index, waiting for report text.
    Report(Box<SecFilingItem>),
}

#[derive(Debug, Deserialize)]
struct Submissions {
    #[serde(default)]
    cik: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    filings: Option<SubmissionFilings>,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    #[serde(default)]
    recent: Option<RecentFilings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

/// Recent 10-K, 10-Q and 8-K filings for one company from EDGAR.
#[derive(Debug)]
pub struct SecFilings {
    cik: String,
    ticker: String,
    submissions_url: String,
    archives_url: String,
}

impl SecFilings {
    pub fn new(cik: String, ticker: String, settings: &Settings) -> Self {
        Self {
            cik,
            ticker,
            submissions_url: settings.sec_submissions_url.clone(),
            archives_url: settings.sec_archives_url.clone(),
        }
    }

    /// Build from `-a cik=...` and/or `-a ticker=...`. A ticker without a
    /// CIK is resolved through SEC's ticker list.
    pub async fn from_args(args: &JobArgs, settings: &Settings) -> Result<Self> {
        let ticker = args
            .get("ticker")
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty());
        let cik = args.get("cik").map(|c| c.trim()).filter(|c| !c.is_empty());

        let (cik, ticker) = match (cik, ticker) {
            (Some(cik), ticker) => {
                let cik = pad_cik(cik)?;
                let ticker = ticker.unwrap_or_else(|| cik.clone());
                (cik, ticker)
            }
            (None, Some(ticker)) => {
                let client = build_client(settings)?;
                let cik = resolve_cik(&client, settings, &ticker).await?;
                (cik, ticker)
            }
            (None, None) => {
                return Err(ScrapeError::InvalidArgument(
                    "provide -a cik=... or -a ticker=...".to_string(),
                )
                .into())
            }
        };

        info!("Initialized SEC job - Ticker: {}, CIK: {}", ticker, cik);
        Ok(Self::new(cik, ticker, settings))
    }

    pub fn cik(&self) -> &str {
        &self.cik
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn submissions_url(&self) -> String {
        format!("{}/CIK{}.json", self.submissions_url, self.cik)
    }

    pub fn report_url(&self, cik: &str, accession_no: &str, primary_doc: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.archives_url,
            unpadded_cik(cik),
            accession_no.replace('-', ""),
            primary_doc
        )
    }

    fn parse_submissions(&self, response: &Response) -> Result<Vec<Output<SecCallback>>> {
        let data: Submissions = response.json()?;
        let cik = cik_from_value(&data.cik)
            .and_then(|c| pad_cik(&c).ok())
            .unwrap_or_else(|| self.cik.clone());
        let company = data.name.unwrap_or_default();
        info!("Company: {} (CIK {})", company, cik);

        let Some(filings) = data.filings else {
            error!("No 'filings' key in submissions response from {}", response.url);
            return Ok(Vec::new());
        };
        let Some(recent) = filings.recent else {
            error!("No 'recent' filings in submissions response from {}", response.url);
            return Ok(Vec::new());
        };
        info!("Found {} total filings", recent.form.len());

        let mut outputs = Vec::new();
        let rows = recent
            .form
            .iter()
            .zip(&recent.filing_date)
            .zip(&recent.accession_number)
            .zip(&recent.primary_document);
        for (((form, date), accession), primary_doc) in rows {
            if !RELEVANT_FORMS.contains(&form.as_str()) {
                continue;
            }
            let report_url = self.report_url(&cik, accession, primary_doc);
            info!("Following {} filing from {}: {}", form, date, report_url);

            let filing = SecFilingItem {
                cik: cik.clone(),
                ticker: self.ticker.clone(),
                company_name: company.clone(),
                form: form.clone(),
                filing_date: date.clone(),
                accession_no: accession.clone(),
                primary_doc: primary_doc.clone(),
                report_url: report_url.clone(),
                report_text: String::new(),
                sentiment: None,
            };
            let request = Request::get(&report_url, SecCallback::Report(Box::new(filing)))?
                .header("Accept", REPORT_ACCEPT)
                .dont_filter();
            outputs.push(Output::Request(request));
        }

        info!(
            "Found {} relevant filings ({})",
            outputs.len(),
            RELEVANT_FORMS.join(", ")
        );
        if outputs.is_empty() {
            warn!("No relevant filings found for {}", self.ticker);
        }
        Ok(outputs)
    }
}

fn parse_report(response: &Response, mut filing: SecFilingItem) -> Vec<Output<SecCallback>> {
    let text = html_to_text(&response.text());
    if text.is_empty() {
        warn!("No text content found in report: {}", response.url);
        return Vec::new();
    }

    filing.report_text = truncate_words(&text, MAX_REPORT_WORDS);
    info!(
        "Created SEC filing item: {} - {} - {}",
        filing.ticker, filing.form, filing.filing_date
    );
    vec![Output::Item(ScrapedItem::Filing(filing))]
}

impl Spider for SecFilings {
    type Callback = SecCallback;

    fn name(&self) -> &'static str {
        NAME
    }

    fn start_requests(&self) -> Result<Vec<Request<SecCallback>>> {
        let url = self.submissions_url();
        info!("Requesting SEC data from: {}", url);
        let request = Request::get(&url, SecCallback::Submissions)?
            .header("Accept", "application/json")
            .dont_filter();
        Ok(vec![request])
    }

    fn parse(&self, response: &Response, callback: SecCallback) -> Result<Vec<Output<SecCallback>>> {
        match callback {
            SecCallback::Submissions => self.parse_submissions(response),
            SecCallback::Report(filing) => Ok(parse_report(response, *filing)),
        }
    }
}
