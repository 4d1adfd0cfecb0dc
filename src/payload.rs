// Typed response bodies for the custom apps endpoints.
//
// Payloads are only ever produced by parsing a server response through
// `ApiPayload::from_json`; requests are built from discrete fields in
// `apps`, never by re-serializing one of these.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Parse a response body into a payload, failing with
/// [`ApiError::Validation`](crate::ApiError::Validation) on any mismatch.
pub trait ApiPayload: DeserializeOwned {
    fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// How the artifact is installed on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallType {
    Package,
    Zip,
    Image,
}

impl InstallType {
    pub const ALL: [InstallType; 3] = [InstallType::Package, InstallType::Zip, InstallType::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallType::Package => "package",
            InstallType::Zip => "zip",
            InstallType::Image => "image",
        }
    }
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallEnforcement {
    InstallOnce,
    ContinuouslyEnforce,
    NoEnforcement,
}

impl InstallEnforcement {
    pub const ALL: [InstallEnforcement; 3] = [
        InstallEnforcement::InstallOnce,
        InstallEnforcement::ContinuouslyEnforce,
        InstallEnforcement::NoEnforcement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallEnforcement::InstallOnce => "install_once",
            InstallEnforcement::ContinuouslyEnforce => "continuously_enforce",
            InstallEnforcement::NoEnforcement => "no_enforcement",
        }
    }
}

impl fmt::Display for InstallEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A custom app library item as returned by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomAppPayload {
    pub id: String,
    pub name: String,
    pub file_key: String,
    pub install_type: InstallType,
    pub install_enforcement: InstallEnforcement,
    pub audit_script: String,
    pub unzip_location: Option<String>,
    pub active: bool,
    pub restart: bool,
    pub preinstall_script: String,
    pub postinstall_script: String,
    /// Temporary download link; not always present in list responses.
    #[serde(default)]
    pub file_url: Option<String>,
    pub sha256: String,
    pub file_size: u64,
    pub file_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub show_in_self_service: bool,
    #[serde(default)]
    pub self_service_category_id: Option<String>,
    #[serde(default)]
    pub self_service_recommended: Option<bool>,
}

impl ApiPayload for CustomAppPayload {}

/// Presigned upload ticket returned by the `upload` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomAppUploadPayload {
    pub name: String,
    pub expires: DateTime<Utc>,
    pub post_url: String,
    /// Form fields that must accompany the file in the storage POST.
    pub post_data: BTreeMap<String, String>,
    /// Reference to pass as `file_key` when creating or updating an app.
    pub file_key: String,
}

impl ApiPayload for CustomAppUploadPayload {}

/// One page of results. `next` points at the following page, if any.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PayloadList<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Default for PayloadList<T> {
    fn default() -> Self {
        PayloadList {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

impl<T: DeserializeOwned> ApiPayload for PayloadList<T> {}
