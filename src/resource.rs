// Session lifecycle shared by resource clients.
//
// A resource owns a `ResourceSessions` pair (management API plus
// storage). The sessions exist only between `open()` and `close()`;
// `Resource::enter` hands back a guard that closes both when it goes
// out of scope, including on early `?` returns and panics.

use std::ops::Deref;

use crate::client::ApiClient;
use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use crate::s3_client::S3ApiClient;

/// The management API and storage sessions for one resource client.
#[derive(Debug)]
pub struct ResourceSessions {
    config: ApiConfig,
    client: Option<ApiClient>,
    s3_client: Option<S3ApiClient>,
}

impl ResourceSessions {
    pub fn new(config: ApiConfig) -> Self {
        ResourceSessions {
            config,
            client: None,
            s3_client: None,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Open both sessions. Nothing is stored unless both could be built.
    pub fn open(&mut self) -> Result<()> {
        let client = ApiClient::new(&self.config)?;
        let s3_client = S3ApiClient::new()?;
        self.close();
        self.client = Some(client);
        self.s3_client = Some(s3_client);
        Ok(())
    }

    /// Close both sessions. A no-op when already closed.
    pub fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close();
        }
        if let Some(mut s3_client) = self.s3_client.take() {
            s3_client.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some() && self.s3_client.is_some()
    }

    pub fn client(&self) -> Result<&ApiClient> {
        self.client
            .as_ref()
            .ok_or(ApiError::ClientNotOpen("No open client available."))
    }

    pub fn s3_client(&self) -> Result<&S3ApiClient> {
        self.s3_client
            .as_ref()
            .ok_or(ApiError::ClientNotOpen("No open S3 client available."))
    }
}

/// A client for one REST resource living under `PATH`.
pub trait Resource: Sized {
    /// Base path of the resource, e.g. `/api/v1/library/custom-apps`.
    const PATH: &'static str;

    fn sessions(&self) -> &ResourceSessions;

    fn sessions_mut(&mut self) -> &mut ResourceSessions;

    fn open(&mut self) -> Result<()> {
        self.sessions_mut().open()
    }

    fn close(&mut self) {
        self.sessions_mut().close()
    }

    fn is_open(&self) -> bool {
        self.sessions().is_open()
    }

    fn client(&self) -> Result<&ApiClient> {
        self.sessions().client()
    }

    fn s3_client(&self) -> Result<&S3ApiClient> {
        self.sessions().s3_client()
    }

    /// Open the sessions and return a guard that closes them on drop.
    fn enter(&mut self) -> Result<OpenResource<'_, Self>> {
        self.open()?;
        Ok(OpenResource { resource: self })
    }
}

/// Scope guard returned by [`Resource::enter`].
#[derive(Debug)]
pub struct OpenResource<'a, R: Resource> {
    resource: &'a mut R,
}

impl<R: Resource> Deref for OpenResource<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.resource
    }
}

impl<R: Resource> Drop for OpenResource<'_, R> {
    fn drop(&mut self) {
        self.resource.close();
    }
}
