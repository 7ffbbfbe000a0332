use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::error::KappaError;
use crate::output::{ProgressEvent, ProgressSink};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DOWNLOAD_CHUNK: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Explicit credential seam for the authenticated drive endpoint. Injected
/// at client construction instead of process-wide token state.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Result<AccessToken, KappaError>;
    fn refresh(&self) -> Result<AccessToken, KappaError>;
}

/// Fixed token from config or the KAPPA_MM_DRIVE_TOKEN environment variable.
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn from_env_or(config_token: Option<String>) -> Self {
        let token = std::env::var("KAPPA_MM_DRIVE_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or(config_token);
        Self { token }
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn token(&self) -> Result<AccessToken, KappaError> {
        self.token
            .as_deref()
            .map(AccessToken::new)
            .ok_or_else(|| {
                KappaError::Auth(
                    "no drive token configured (set KAPPA_MM_DRIVE_TOKEN or drive_token in kappa-mm.json)"
                        .to_string(),
                )
            })
    }

    fn refresh(&self) -> Result<AccessToken, KappaError> {
        Err(KappaError::Auth(
            "static drive token expired and cannot be refreshed".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveEntry {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
}

pub trait DriveClient: Send + Sync {
    fn list_children(&self, folder_id: &str) -> Result<Vec<DriveEntry>, KappaError>;
    fn download_file(&self, file_id: &str, sink: &dyn ProgressSink) -> Result<Vec<u8>, KappaError>;
}

pub struct DriveHttpClient {
    client: Client,
    base_url: String,
    credentials: Box<dyn CredentialProvider>,
}

impl DriveHttpClient {
    pub fn new(credentials: Box<dyn CredentialProvider>) -> Result<Self, KappaError> {
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
            .map_err(|err| KappaError::DriveHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
            credentials,
        })
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
            .unwrap_or_else(|_| "drive request failed".to_string());
        Err(KappaError::DriveStatus { status, message })
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
                    return Err(KappaError::DriveHttp(err.to_string()));
                }
            }
        }
    }

    /// Sends an authenticated request, refreshing the token once on 401.
    fn send_authorized<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, KappaError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let token = self.credentials.token()?;
        let response =
            self.send_with_retries(|| make_req().bearer_auth(token.as_str()))?;
        if response.status().as_u16() == 401 {
            debug!("drive token rejected, refreshing");
            let token = self.credentials.refresh()?;
            let response = self.send_with_retries(|| make_req().bearer_auth(token.as_str()))?;
            return Self::handle_status(response);
        }
        Self::handle_status(response)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

impl DriveClient for DriveHttpClient {
    fn list_children(&self, folder_id: &str) -> Result<Vec<DriveEntry>, KappaError> {
        let url = format!("{}/files", self.base_url);
        let query = format!("'{folder_id}' in parents and trashed = false");
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = self.send_authorized(|| {
                let mut request = self.client.get(&url).query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken, files(id, name, mimeType)"),
                    ("pageSize", "1000"),
                ]);
                if let Some(token) = &token {
                    request = request.query(&[("pageToken", token.as_str())]);
                }
                request
            })?;
            let page: FileList = response
                .json()
                .map_err(|err| KappaError::DriveHttp(err.to_string()))?;
            entries.extend(page.files.into_iter().map(|file| DriveEntry {
                is_folder: file.mime_type == FOLDER_MIME_TYPE,
                id: file.id,
                name: file.name,
            }));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(folder_id, count = entries.len(), "listed drive folder");
        Ok(entries)
    }

    fn download_file(&self, file_id: &str, sink: &dyn ProgressSink) -> Result<Vec<u8>, KappaError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        let mut response =
            self.send_authorized(|| self.client.get(&url).query(&[("alt", "media")]))?;

        let total = response.content_length();
        let mut content = Vec::new();
        let mut buf = vec![0u8; DOWNLOAD_CHUNK];
        let mut last_percent = 0u64;
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|err| KappaError::DriveHttp(err.to_string()))?;
            if read == 0 {
                break;
            }
            content.extend_from_slice(&buf[..read]);
            if let Some(total) = total.filter(|total| *total > 0) {
                let percent = 100 * content.len() as u64 / total;
                if percent > last_percent {
                    last_percent = percent;
                    sink.event(ProgressEvent {
                        message: format!("download {percent}%"),
                        elapsed: None,
                    });
                }
            }
        }
        Ok(content)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
