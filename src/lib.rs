// Library root
// -----------
// Typed client for the custom apps library endpoint of the device
// management API. The binary (`main.rs`) drives it through the
// interactive flows in `ui`.
//
// Module responsibilities:
// - `client`: management API session (auth, base URL, status handling).
// - `s3_client`: POST-only storage session for presigned uploads.
// - `resource`: open/close lifecycle and the scope guard.
// - `apps`: custom app CRUD, validation and the upload protocol.
// - `payload`: typed response bodies.
// - `ui`: terminal menu built on the library.
pub mod apps;
pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod resource;
pub mod s3_client;
pub mod ui;

pub use apps::{CustomAppUpdate, CustomAppsResource, NewCustomApp, UploadSource};
pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use payload::{
    ApiPayload, CustomAppPayload, CustomAppUploadPayload, InstallEnforcement, InstallType,
    PayloadList,
};
pub use resource::{OpenResource, Resource, ResourceSessions};
pub use s3_client::{S3ApiClient, S3Response};
