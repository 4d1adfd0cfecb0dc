// Custom apps resource: CRUD on `/api/v1/library/custom-apps` plus the
// two-step upload (ask the API for a presigned POST, then send the file
// to storage).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use reqwest::blocking::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use crate::payload::{
    ApiPayload, CustomAppPayload, CustomAppUploadPayload, InstallEnforcement, InstallType,
    PayloadList,
};
use crate::resource::{Resource, ResourceSessions};

const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Fields for creating a custom app. `None` optionals are left out of the
/// request entirely rather than sent as empty values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCustomApp {
    pub name: String,
    pub file_key: String,
    /// One of `package`, `zip` or `image`.
    pub install_type: String,
    pub install_enforcement: String,
    /// Only allowed when `install_enforcement` is `continuously_enforce`.
    pub audit_script: String,
    pub preinstall_script: String,
    pub postinstall_script: String,
    pub restart: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_in_self_service: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_service_category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_service_recommended: Option<bool>,
    /// Required when `install_type` is `zip`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unzip_location: Option<String>,
}

impl NewCustomApp {
    /// An active app with empty scripts, no restart, hidden from Self Service.
    pub fn new(
        name: impl Into<String>,
        file_key: impl Into<String>,
        install_type: impl Into<String>,
        install_enforcement: impl Into<String>,
    ) -> Self {
        NewCustomApp {
            name: name.into(),
            file_key: file_key.into(),
            install_type: install_type.into(),
            install_enforcement: install_enforcement.into(),
            audit_script: String::new(),
            preinstall_script: String::new(),
            postinstall_script: String::new(),
            restart: false,
            active: true,
            show_in_self_service: Some(false),
            self_service_category_id: None,
            self_service_recommended: None,
            unzip_location: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(
            Some(self.install_type.as_str()),
            Some(self.install_enforcement.as_str()),
            Some(self.audit_script.as_str()),
            self.unzip_location.as_deref(),
        )
    }
}

/// Partial update. Only `Some` fields are sent; the default value is the
/// empty change set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomAppUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_enforcement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preinstall_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postinstall_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_in_self_service: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_service_category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_service_recommended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unzip_location: Option<String>,
}

impl CustomAppUpdate {
    pub fn is_empty(&self) -> bool {
        *self == CustomAppUpdate::default()
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(
            self.install_type.as_deref(),
            self.install_enforcement.as_deref(),
            self.audit_script.as_deref(),
            self.unzip_location.as_deref(),
        )
    }
}

/// Rules shared by create and update. `None` means the field was not
/// supplied.
fn validate_fields(
    install_type: Option<&str>,
    install_enforcement: Option<&str>,
    audit_script: Option<&str>,
    unzip_location: Option<&str>,
) -> Result<()> {
    let continuously_enforce = InstallEnforcement::ContinuouslyEnforce.as_str();
    let has_audit_script = audit_script.is_some_and(|s| !s.is_empty());
    if has_audit_script && install_enforcement != Some(continuously_enforce) {
        return Err(ApiError::InvalidArgument(format!(
            "audit_script can only be used with install_enforcement '{continuously_enforce}'"
        )));
    }
    if install_type == Some(InstallType::Zip.as_str()) && unzip_location.is_none() {
        return Err(ApiError::InvalidArgument(
            "unzip_location must be provided when install_type is 'zip'".into(),
        ));
    }
    if let Some(install_type) = install_type {
        if !InstallType::ALL.iter().any(|t| t.as_str() == install_type) {
            return Err(ApiError::InvalidArgument(
                "install_type must be one of 'package', 'zip', or 'image'".into(),
            ));
        }
    }
    Ok(())
}

/// What to send to storage: a file on disk, or a reader the caller keeps
/// ownership of.
pub enum UploadSource<'a> {
    /// Opened here and closed once the request completes.
    Path(PathBuf),
    /// An open file the caller keeps. Streamed from its current position
    /// through a cloned handle, which shares that position.
    File { file_name: String, file: &'a File },
    /// Read to the end into memory for this one request; the caller closes
    /// it. Prefer `File` for large packages.
    Reader {
        file_name: String,
        reader: &'a mut dyn Read,
    },
}

impl std::fmt::Debug for UploadSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            UploadSource::File { file_name, .. } => {
                f.debug_struct("File").field("file_name", file_name).finish_non_exhaustive()
            }
            UploadSource::Reader { file_name, .. } => {
                f.debug_struct("Reader").field("file_name", file_name).finish_non_exhaustive()
            }
        }
    }
}

impl UploadSource<'_> {
    /// Build the multipart `file` part. Path sources are checked before
    /// anything is opened.
    fn into_part(self) -> Result<Part> {
        let part = match self {
            UploadSource::Path(path) => {
                let file = open_regular_file(&path)?;
                let len = file.metadata()?.len();
                Part::reader_with_length(file, len).file_name(file_name_of(&path))
            }
            UploadSource::File { file_name, file } => {
                let mut handle = file.try_clone()?;
                let len = handle.metadata()?.len();
                let remaining = len.saturating_sub(handle.stream_position()?);
                Part::reader_with_length(handle, remaining).file_name(file_name)
            }
            UploadSource::Reader { file_name, reader } => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Part::bytes(buf).file_name(file_name)
            }
        };
        part.mime_str(UPLOAD_CONTENT_TYPE).map_err(ApiError::Connection)
    }
}

fn open_regular_file(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(ApiError::FileNotFound(path.to_path_buf()));
    }
    File::open(path).map_err(|_| ApiError::FileNotFound(path.to_path_buf()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// Client for the custom apps library endpoint.
#[derive(Debug)]
pub struct CustomAppsResource {
    sessions: ResourceSessions,
}

impl Resource for CustomAppsResource {
    const PATH: &'static str = "/api/v1/library/custom-apps";

    fn sessions(&self) -> &ResourceSessions {
        &self.sessions
    }

    fn sessions_mut(&mut self) -> &mut ResourceSessions {
        &mut self.sessions
    }
}

impl CustomAppsResource {
    /// A closed resource; call `open()` or `enter()` before use.
    pub fn new(config: ApiConfig) -> Self {
        CustomAppsResource {
            sessions: ResourceSessions::new(config),
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", Self::PATH, id)
    }

    /// Fetch every page and return the combined results.
    pub fn list(&self) -> Result<PayloadList<CustomAppPayload>> {
        let client = self.client()?;
        let mut all_results = PayloadList::default();
        let mut next_page = Some(Self::PATH.to_string());

        while let Some(page_url) = next_page {
            let body = client.get(&page_url)?;
            let page = PayloadList::<CustomAppPayload>::from_json(&body)?;
            debug!(
                url = %page_url,
                items = page.results.len(),
                count = page.count,
                "fetched custom apps page"
            );

            all_results.count = page.count;
            all_results.results.extend(page.results);
            next_page = page.next.filter(|next| !next.is_empty());
        }

        if all_results.results.len() as u64 != all_results.count {
            warn!(
                count = all_results.count,
                received = all_results.results.len(),
                "custom apps count does not match items received"
            );
        }
        Ok(all_results)
    }

    pub fn get(&self, id: &str) -> Result<CustomAppPayload> {
        let body = self.client()?.get(&Self::item_path(id))?;
        CustomAppPayload::from_json(&body)
    }

    /// Validate `app` and create it. Fails with
    /// [`ApiError::InvalidArgument`] before any request on a rule violation.
    pub fn create(&self, app: &NewCustomApp) -> Result<CustomAppPayload> {
        app.validate()?;
        let body = self.client()?.post(Self::PATH, app)?;
        CustomAppPayload::from_json(&body)
    }

    /// Send only the fields set in `changes`.
    pub fn update(&self, id: &str, changes: &CustomAppUpdate) -> Result<CustomAppPayload> {
        changes.validate()?;
        let body = self.client()?.patch(&Self::item_path(id), changes)?;
        CustomAppPayload::from_json(&body)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.client()?.delete(&Self::item_path(id))?;
        Ok(())
    }

    /// Request a presigned upload ticket for a file called `name`.
    pub fn upload(&self, name: &str) -> Result<CustomAppUploadPayload> {
        let form = [("name", name)];
        let body = self.client()?.post(&format!("{}/upload", Self::PATH), &form)?;
        CustomAppUploadPayload::from_json(&body)
    }

    /// POST `file` and `post_data` to the presigned `post_url`. Storage
    /// answers 204 on success; anything else becomes [`ApiError::Upload`]
    /// with the response body.
    pub fn upload_to_s3(
        &self,
        file: UploadSource<'_>,
        post_url: &str,
        post_data: &BTreeMap<String, String>,
    ) -> Result<()> {
        let part = file.into_part()?;
        let s3_client = self.s3_client()?;

        // Storage only looks at fields sent before the file.
        let form = post_data
            .iter()
            .fold(Form::new(), |form, (key, value)| form.text(key.clone(), value.clone()))
            .part("file", part);

        match s3_client.post(post_url, form) {
            Ok(res) if res.status == StatusCode::NO_CONTENT => Ok(()),
            Ok(res) => Err(ApiError::Upload(res.body)),
            Err(ApiError::Http { body, .. }) => Err(ApiError::Upload(body)),
            Err(e) => Err(e),
        }
    }

    /// Ticket plus upload in one call. The returned ticket's `file_key`
    /// is what `create` or `update` expects.
    pub fn upload_file(&self, path: &Path) -> Result<CustomAppUploadPayload> {
        open_regular_file(path)?;
        let ticket = self.upload(&file_name_of(path))?;
        self.upload_to_s3(
            UploadSource::Path(path.to_path_buf()),
            &ticket.post_url,
            &ticket.post_data,
        )?;
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_apps() -> CustomAppsResource {
        CustomAppsResource::new(ApiConfig::new("https://acme.example", "token").unwrap())
    }

    fn package_app() -> NewCustomApp {
        NewCustomApp::new("App", "library/custom_apps/app.pkg", "package", "install_once")
    }

    fn assert_invalid(result: Result<()>, expected: &str) {
        match result {
            Err(ApiError::InvalidArgument(msg)) => assert!(msg.contains(expected), "{msg}"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn package_app_is_valid() {
        assert!(package_app().validate().is_ok());
    }

    #[test]
    fn audit_script_requires_continuous_enforcement() {
        let mut app = package_app();
        app.audit_script = "#!/bin/bash\necho audit".into();
        assert_invalid(app.validate(), "audit_script can only be used");

        app.install_enforcement = "continuously_enforce".into();
        assert!(app.validate().is_ok());
    }

    #[test]
    fn zip_requires_unzip_location() {
        let mut app = package_app();
        app.install_type = "zip".into();
        assert_invalid(app.validate(), "unzip_location must be provided");

        app.unzip_location = Some("/Applications".into());
        assert!(app.validate().is_ok());
    }

    #[test]
    fn zip_rule_ignores_other_fields() {
        let mut app = package_app();
        app.install_type = "zip".into();
        app.restart = true;
        app.show_in_self_service = Some(true);
        app.self_service_category_id = Some("cat".into());
        assert_invalid(app.validate(), "unzip_location");
    }

    #[test]
    fn unknown_install_type_rejected() {
        let mut app = package_app();
        app.install_type = "dmg".into();
        assert_invalid(app.validate(), "install_type must be one of");
    }

    #[test]
    fn update_rules() {
        assert!(CustomAppUpdate::default().validate().is_ok());

        let bad_type = CustomAppUpdate {
            install_type: Some("invalid_type".into()),
            ..Default::default()
        };
        assert_invalid(bad_type.validate(), "install_type must be one of");

        let zip = CustomAppUpdate {
            install_type: Some("zip".into()),
            ..Default::default()
        };
        assert_invalid(zip.validate(), "unzip_location");

        let audit = CustomAppUpdate {
            install_enforcement: Some("install_once".into()),
            audit_script: Some("#!/bin/bash\necho 'Audit script'".into()),
            ..Default::default()
        };
        assert_invalid(audit.validate(), "audit_script");

        let audit_without_enforcement = CustomAppUpdate {
            audit_script: Some("echo".into()),
            ..Default::default()
        };
        assert_invalid(audit_without_enforcement.validate(), "audit_script");

        let empty_audit = CustomAppUpdate {
            audit_script: Some(String::new()),
            ..Default::default()
        };
        assert!(empty_audit.validate().is_ok());
    }

    #[test]
    fn new_app_omits_unset_optionals() {
        let body = serde_json::to_value(package_app()).unwrap();
        let obj = body.as_object().unwrap();

        assert_eq!(obj["name"], "App");
        assert_eq!(obj["restart"], false);
        assert_eq!(obj["show_in_self_service"], false);
        assert!(!obj.contains_key("unzip_location"));
        assert!(!obj.contains_key("self_service_category_id"));
        assert!(!obj.contains_key("self_service_recommended"));
    }

    #[test]
    fn update_sends_only_supplied_fields() {
        let empty = CustomAppUpdate::default();
        assert!(empty.is_empty());
        assert_eq!(serde_json::to_value(&empty).unwrap(), serde_json::json!({}));

        let changes = CustomAppUpdate {
            name: Some("Renamed".into()),
            active: Some(false),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            serde_json::json!({ "name": "Renamed", "active": false })
        );
    }

    #[test]
    fn validation_runs_before_session_check() {
        let apps = closed_apps();
        let mut app = package_app();
        app.install_type = "zip".into();
        assert!(matches!(apps.create(&app), Err(ApiError::InvalidArgument(_))));
        assert!(matches!(apps.create(&package_app()), Err(ApiError::ClientNotOpen(_))));
    }

    #[test]
    fn operations_on_closed_resource_fail() {
        let apps = closed_apps();
        assert!(matches!(apps.list(), Err(ApiError::ClientNotOpen(_))));
        assert!(matches!(apps.get("id"), Err(ApiError::ClientNotOpen(_))));
        assert!(matches!(apps.delete("id"), Err(ApiError::ClientNotOpen(_))));
        assert!(matches!(apps.upload("app.pkg"), Err(ApiError::ClientNotOpen(_))));
    }

    #[test]
    fn missing_path_is_file_not_found() {
        let apps = closed_apps();
        let err = apps
            .upload_to_s3(
                UploadSource::Path(PathBuf::from("/path/to/nowhere")),
                "post_url",
                &BTreeMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::FileNotFound(_)));
        assert!(err.to_string().contains("does not exist or is not readable"));
    }

    #[test]
    fn directory_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let apps = closed_apps();
        let err = apps
            .upload_to_s3(
                UploadSource::Path(dir.path().to_path_buf()),
                "post_url",
                &BTreeMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::FileNotFound(_)));

        assert!(matches!(apps.upload_file(dir.path()), Err(ApiError::FileNotFound(_))));
    }

    #[test]
    fn file_name_falls_back_for_bare_root() {
        assert_eq!(file_name_of(Path::new("/tmp/test_app.pkg")), "test_app.pkg");
        assert_eq!(file_name_of(Path::new("/")), "upload");
    }
}
