//! SEC EDGAR archive source.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::index::parse_index_page;
use super::submissions::parse_submissions;
use super::{FetchError, FilingSource, RawDocument};
use crate::http_client::HttpClient;
use crate::models::Accession;
use crate::rate_limit::backoff_delay;

/// Base URLs of the archive and the JSON data API.
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    pub archive: String,
    pub data: String,
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archive: "https://www.sec.gov".to_string(),
            data: "https://data.sec.gov".to_string(),
        }
    }
}

/// Fetches 13F submissions from the EDGAR archive.
pub struct EdgarSource {
    client: HttpClient,
    urls: EdgarUrls,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl EdgarSource {
    pub fn new(client: HttpClient, max_attempts: u32) -> Self {
        Self {
            client,
            urls: EdgarUrls::default(),
            max_attempts: max_attempts.max(1),
            backoff_base_ms: 500,
        }
    }

    pub fn with_urls(mut self, urls: EdgarUrls) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_backoff_base_ms(mut self, base_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self
    }

    fn archive_dir(&self, accession: &Accession) -> String {
        format!(
            "{}/Archives/edgar/data/{}/{}",
            self.urls.archive.trim_end_matches('/'),
            accession.cik_unpadded(),
            accession.id.compact()
        )
    }

    /// `{dir}/{acsn}-index.html`
    pub fn index_url(&self, accession: &Accession) -> String {
        format!("{}/{}-index.html", self.archive_dir(accession), accession.id)
    }

    /// `{dir}/{acsn}.txt`
    pub fn full_text_url(&self, accession: &Accession) -> String {
        format!("{}/{}.txt", self.archive_dir(accession), accession.id)
    }

    pub fn submissions_url(&self, cik: &str) -> String {
        let digits = crate::models::normalize_cik(cik);
        format!(
            "{}/submissions/CIK{}.json",
            self.urls.data.trim_end_matches('/'),
            digits
        )
    }

    /// GET with bounded retry on transient failures.
    ///
    /// Each attempt uses the next contact user agent. 429, 403 and 5xx
    /// responses and transport errors are retried; 404, 410 and other 4xx
    /// are terminal.
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            let mut wait = backoff_delay(attempt, self.backoff_base_ms);

            match self.client.get(url, attempt).await {
                Ok(response) if response.is_success() => {
                    return response.text().await.map_err(|e| FetchError::Transient {
                        url: url.to_string(),
                        message: format!("reading body: {}", e),
                    });
                }
                Ok(response) => {
                    let status = response.status.as_u16();
                    let retryable = status == 429 || status == 403 || status >= 500;
                    if !retryable {
                        return Err(FetchError::NotFound {
                            url: url.to_string(),
                            status,
                        });
                    }
                    if let Some(retry_after) = response.retry_after() {
                        wait = wait.max(retry_after);
                    }
                    last_error = Some(FetchError::Transient {
                        url: url.to_string(),
                        message: format!("HTTP {}", status),
                    });
                }
                Err(e) => {
                    last_error = Some(FetchError::Transient {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
            }

            if attempt + 1 < self.max_attempts {
                warn!(
                    "Retry {}/{} for {} after {:?}",
                    attempt + 1,
                    self.max_attempts - 1,
                    url,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Transient {
            url: url.to_string(),
            message: "no attempts made".to_string(),
        }))
    }
}

#[async_trait]
impl FilingSource for EdgarSource {
    fn name(&self) -> &str {
        "edgar"
    }

    async fn fetch_document(&self, accession: &Accession) -> Result<RawDocument, FetchError> {
        if let Some(ref url) = accession.document_url {
            let text = self.get_text(url).await?;
            return Ok(RawDocument::new(accession.id.clone(), url.clone(), text));
        }

        let index_url = self.index_url(accession);
        let links = match self.get_text(&index_url).await {
            Ok(html) => parse_index_page(&html, &self.urls.archive),
            Err(e @ FetchError::NotFound { .. }) => return Err(e),
            Err(e) => {
                warn!(
                    "Index unavailable for {} ({}), using conventional text URL",
                    accession.id, e
                );
                Default::default()
            }
        };

        let text_url = links
            .complete_text
            .unwrap_or_else(|| self.full_text_url(accession));
        debug!("Fetching {} from {}", accession.id, text_url);
        let text = self.get_text(&text_url).await?;
        let mut document = RawDocument::new(accession.id.clone(), text_url, text);

        if let Some(info_url) = links.info_table {
            match self.get_text(&info_url).await {
                Ok(html) => document = document.with_info_table_html(html),
                Err(e) => warn!("Information table page unavailable for {}: {}", accession.id, e),
            }
        }

        Ok(document)
    }

    async fn list_pending_accessions(&self, cik: &str) -> Result<Vec<Accession>, FetchError> {
        let url = self.submissions_url(cik);
        let json = self.get_text(&url).await?;
        let accessions = parse_submissions(&json).map_err(|e| FetchError::InvalidResponse {
            url: url.clone(),
            message: e.to_string(),
        })?;
        info!("{} lists {} holdings reports", url, accessions.len());
        Ok(accessions)
    }
}
