// Storage session used only for the upload step: a bare POST of a
// multipart form to a presigned URL. No auth headers, no retries.

use crate::error::{ApiError, Result};
use reqwest::blocking::{multipart::Form, Client, Response};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::{debug, error};

/// Status and body of a storage response that passed the 2xx check.
#[derive(Debug, Clone)]
pub struct S3Response {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug)]
pub struct S3ApiClient {
    session: Option<Client>,
}

impl S3ApiClient {
    pub fn new() -> Result<Self> {
        let session = Client::builder()
            .user_agent(crate::client::USER_AGENT)
            .build()
            .map_err(ApiError::Connection)?;
        Ok(S3ApiClient {
            session: Some(session),
        })
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn close(&mut self) {
        self.session = None;
    }

    fn session(&self) -> Result<&Client> {
        self.session
            .as_ref()
            .ok_or(ApiError::ClientNotOpen("No open session available."))
    }

    /// POST `form` to a presigned URL. Non-2xx responses come back as
    /// [`ApiError::Http`] carrying the response body.
    pub fn post(&self, url: &str, form: Form) -> Result<S3Response> {
        let session = self.session()?;
        debug!("Making POST request to {url}");

        let res = session.post(url).multipart(form).send().map_err(|e| {
            error!("Connection error occurred: {e}");
            ApiError::Connection(e)
        })?;
        let status = res.status();
        debug!("Response status code: {}", status.as_u16());
        debug!("Response headers: {}", render_headers(res.headers()));

        let body = read_body(res)?;
        debug!("Response content: {}", render_body(&body));

        if !status.is_success() {
            error!("HTTP error occurred: {}", status.as_u16());
            error!("Response content: {body}");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(S3Response { status, body })
    }
}

fn read_body(res: Response) -> Result<String> {
    res.text().map_err(ApiError::Connection)
}

/// Headers as pretty JSON, values that are not valid UTF-8 rendered lossily.
fn render_headers(headers: &HeaderMap) -> String {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), serde_json::Value::String(value))
        })
        .collect();
    serde_json::to_string_pretty(&map).unwrap_or_else(|_| format!("{headers:?}"))
}

/// Pretty JSON when the body parses, raw text otherwise.
fn render_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}
