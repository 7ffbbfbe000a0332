use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::LensModel;
use crate::error::KappaError;

pub trait FrontierClient: Send + Sync {
    fn list_maps(&self, model: &LensModel) -> Result<Vec<String>, KappaError>;
    fn download_map(&self, model: &LensModel, filename: &str) -> Result<Vec<u8>, KappaError>;
}

/// Unauthenticated client for the STScI Frontier Fields archive. Listing
/// scrapes the hrefs out of the directory page.
pub struct FrontierHttpClient {
    client: Client,
    base_url: String,
}

impl FrontierHttpClient {
    pub fn new() -> Result<Self, KappaError> {
        Self::with_base_url("https://archive.stsci.edu/pub/hlsp/frontier/abell2744/models")
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, KappaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kappa-mm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KappaError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KappaError::ArchiveHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn range_url(&self, model: &LensModel) -> String {
        format!(
            "{}/{}/{}/range/",
            self.base_url, model.method, model.version
        )
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KappaError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "archive request failed".to_string());
        Err(KappaError::ArchiveStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KappaError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KappaError::ArchiveHttp(err.to_string()));
                }
            }
        }
    }
}

/// Extracts the `hlsp_*` entries out of an archive directory listing page.
pub fn extract_map_hrefs(html: &str) -> Vec<String> {
    let href_re = Regex::new(r#"href="([^"]+)""#).unwrap();
    href_re
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .filter(|href| href.starts_with("hlsp"))
        .collect()
}

impl FrontierClient for FrontierHttpClient {
    fn list_maps(&self, model: &LensModel) -> Result<Vec<String>, KappaError> {
        let url = self.range_url(model);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        let html = response
            .text()
            .map_err(|err| KappaError::ArchiveHttp(err.to_string()))?;
        let maps = extract_map_hrefs(&html);
        debug!(model = %model, count = maps.len(), "listed archive maps");
        Ok(maps)
    }

    fn download_map(&self, model: &LensModel, filename: &str) -> Result<Vec<u8>, KappaError> {
        let url = format!("{}{}", self.range_url(model), filename);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| KappaError::ArchiveHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
