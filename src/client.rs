// Management API session: a blocking reqwest client bound to one tenant
// and token. Resource clients go through this for every call to
// `/api/v1/...`; it knows nothing about individual resources.

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::Serialize;
use tracing::{debug, error};

pub const USER_AGENT: &str = concat!("kst-apps/", env!("CARGO_PKG_VERSION"));

/// Blocking session against the management API. Holds the reqwest
/// client until `close()` is called; after that every request fails with
/// [`ApiError::ClientNotOpen`].
#[derive(Debug)]
pub struct ApiClient {
    session: Option<Client>,
    base_url: Url,
}

impl ApiClient {
    /// Open a session for the tenant in `config`.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let session = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers(&config.api_token)?)
            .build()
            .map_err(ApiError::Connection)?;
        Ok(ApiClient {
            session: Some(session),
            base_url: config.tenant_url.clone(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Release the underlying session. Safe to call more than once.
    pub fn close(&mut self) {
        self.session = None;
    }

    fn session(&self) -> Result<&Client> {
        self.session
            .as_ref()
            .ok_or(ApiError::ClientNotOpen("No open session available."))
    }

    /// Resolve a path against the tenant URL. Absolute URLs (such as a
    /// page's `next` link) come back unchanged.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidArgument(format!("invalid request path {path:?}: {e}")))
    }

    pub fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.request::<()>(Method::GET, path, None)
    }

    pub fn post<F: Serialize + ?Sized>(&self, path: &str, form: &F) -> Result<Vec<u8>> {
        self.request(Method::POST, path, Some(form))
    }

    pub fn patch<F: Serialize + ?Sized>(&self, path: &str, form: &F) -> Result<Vec<u8>> {
        self.request(Method::PATCH, path, Some(form))
    }

    pub fn delete(&self, path: &str) -> Result<Vec<u8>> {
        self.request::<()>(Method::DELETE, path, None)
    }

    /// Send one request and return the body of a 2xx response.
    fn request<F: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        form: Option<&F>,
    ) -> Result<Vec<u8>> {
        let session = self.session()?;
        let url = self.url(path)?;
        debug!(%method, %url, "sending API request");

        let mut req = session.request(method.clone(), url.clone());
        if let Some(form) = form {
            req = req.form(form);
        }

        let res = req.send().map_err(|e| {
            error!(%method, %url, error = %e, "connection error");
            ApiError::Connection(e)
        })?;

        let status = res.status();
        debug!(%method, %url, status = status.as_u16(), "received API response");
        let body = res.bytes().map_err(ApiError::Connection)?.to_vec();

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            error!(%method, %url, status = status.as_u16(), %body, "API request failed");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Headers sent with every request: bearer token and JSON accept.
fn default_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ApiError::Config("API token contains invalid header characters".into()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(headers)
}
