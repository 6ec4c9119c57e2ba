//! HTTP fetch of odds pages and per-race collection across sources.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{CONTENT_TYPE, REFERER};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{FetchConfig, SourceConfig};
use crate::extractor::{decode, Extractor};
use crate::merge::merge_by_precedence;
use crate::retry::{retry, RetryConfig};
use crate::types::{RaceKey, RaceSnapshot};

/// Response body with the charset its `Content-Type` declared
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: Vec<u8>,
    pub charset: Option<String>,
}

/// Merged snapshot of one race plus what happened per source
#[derive(Debug, Clone)]
pub struct RaceCollection {
    pub snapshot: RaceSnapshot,
    pub log: Vec<String>,
}

/// Expand `{race_no}` and `{date}` in a source URL template
pub fn source_url(template: &str, race_no: u8, date: NaiveDate) -> String {
    template
        .replace("{race_no}", &race_no.to_string())
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
}

/// `text/html; charset=big5` -> `big5`
pub fn charset_from_content_type(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(['"', '\'']);
        (!value.is_empty()).then(|| value.to_lowercase())
    })
}

/// Client for the configured odds sources
pub struct OddsFetcher {
    http: reqwest::Client,
    sources: Vec<SourceConfig>,
    retry: RetryConfig,
    extractor: Extractor,
}

impl OddsFetcher {
    pub fn new(config: &FetchConfig, extractor: Extractor) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build odds http client")?;

        Ok(Self {
            http,
            sources: config.sources.clone(),
            retry: RetryConfig::from_fetch(config),
            extractor,
        })
    }

    async fn fetch_once(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage> {
        let mut request = self.http.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let res = request.send().await.with_context(|| format!("request to {} failed", url))?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}", url, status);
        }

        let charset = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let body = res
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {}", url))?;

        Ok(FetchedPage {
            url: url.to_string(),
            body: body.to_vec(),
            charset,
        })
    }

    /// One source page for one race, retried a fixed number of times
    pub async fn fetch_source(&self, source: &SourceConfig, key: &RaceKey) -> Result<FetchedPage> {
        let url = source_url(&source.url, key.race_number, key.date);
        debug!("Fetching {} for {}: {}", source.name, key, url);
        let operation = format!("fetch {} {}", source.name, key);
        retry(&self.retry, &operation, || self.fetch_once(&url, source.referer.as_deref())).await
    }

    /// Fetch every source for one race, extract and merge by precedence.
    ///
    /// Source failures are logged and skipped; a race nobody served comes
    /// back as an empty snapshot.
    pub async fn collect_race(&self, key: RaceKey) -> RaceCollection {
        let mut log = Vec::new();
        let mut per_source = Vec::new();
        let mut raw_inputs = Vec::new();
        let mut used = Vec::new();

        for source in &self.sources {
            let page = match self.fetch_source(source, &key).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("{} {}: {:#}", source.name, key, e);
                    log.push(format!("{}: fetch failed: {:#}", source.name, e));
                    continue;
                }
            };

            let decoded = decode(&page.body, page.charset.as_deref());
            let extraction = self.extractor.extract(&decoded.text, source.hint);
            log.push(format!(
                "{}: {} bytes as {}, {} records",
                source.name,
                page.body.len(),
                decoded.encoding,
                extraction.records.len()
            ));
            for line in &extraction.log {
                debug!("{} {}: {}", source.name, key, line);
                log.push(format!("{}: {}", source.name, line));
            }

            if !extraction.is_empty() {
                used.push(source.name.clone());
                per_source.push(extraction.records);
            }
            raw_inputs.push(decoded.text);
        }

        let records = merge_by_precedence(&per_source);
        info!("{}: {} records from {} sources", key, records.len(), used.len());

        let mut snapshot = RaceSnapshot::new(key, records);
        snapshot.raw_inputs = raw_inputs;
        snapshot.source = (!used.is_empty()).then(|| used.join("+"));
        RaceCollection { snapshot, log }
    }
}
