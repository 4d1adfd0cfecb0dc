// UI layer: interactive menu using `dialoguer`, with `indicatif` spinners
// around network calls. Every flow calls straight into the library; errors
// from a single action are printed and the menu keeps running.

use crate::apps::{CustomAppUpdate, CustomAppsResource, NewCustomApp};
use crate::config::{config_file_path, ApiConfig};
use crate::payload::{CustomAppPayload, InstallEnforcement, InstallType};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Load configuration from the environment or config file. If neither is
/// set up, prompt for it and offer to save the answer.
pub fn resolve_config() -> Result<ApiConfig> {
    match ApiConfig::from_env() {
        Ok(config) => Ok(config),
        Err(e) => {
            println!("{}", format!("No usable configuration: {e}").yellow());
            let tenant: String = Input::new()
                .with_prompt("Tenant API URL (e.g. https://acme.api.kandji.io)")
                .interact_text()?;
            let token: String = Password::new().with_prompt("API token").interact()?;
            let config = ApiConfig::new(&tenant, &token)?;

            if let Some(path) = config_file_path() {
                let save = Confirm::new()
                    .with_prompt(format!("Save to {}?", path.display()))
                    .default(true)
                    .interact()?;
                if save {
                    config
                        .save(&path)
                        .with_context(|| format!("Failed to save config to {}", path.display()))?;
                }
            }
            Ok(config)
        }
    }
}

/// Main interactive menu. Runs until the user chooses "Exit".
pub fn main_menu(apps: &CustomAppsResource) -> Result<()> {
    let items = [
        "List custom apps",
        "Show custom app",
        "Upload and create custom app",
        "Update custom app",
        "Delete custom app",
        "Exit",
    ];
    loop {
        let selection = Select::new().items(&items).default(0).interact()?;
        let outcome = match selection {
            0 => handle_list(apps),
            1 => handle_show(apps),
            2 => handle_create(apps),
            3 => handle_update(apps),
            4 => handle_delete(apps),
            _ => break,
        };
        if let Err(e) = outcome {
            println!("{}", format!("{e:#}").red());
        }
    }
    Ok(())
}

fn start_spinner(message: &'static str) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

fn handle_list(apps: &CustomAppsResource) -> Result<()> {
    let progress = start_spinner("Fetching custom apps...")?;
    let list = apps.list();
    progress.finish_and_clear();
    let list = list.context("Failed to list custom apps")?;

    if list.results.is_empty() {
        println!("No custom apps found.");
        return Ok(());
    }
    for app in &list.results {
        let state = if app.active {
            "active".green()
        } else {
            "inactive".dark_grey()
        };
        println!(
            "{}  {}  [{}] {}",
            app.id.as_str().dark_grey(),
            app.name.as_str().bold(),
            app.install_type,
            state
        );
    }
    println!("{} custom app(s)", list.count);
    Ok(())
}

fn handle_show(apps: &CustomAppsResource) -> Result<()> {
    let id: String = Input::new().with_prompt("Custom app id").interact_text()?;
    let progress = start_spinner("Fetching custom app...")?;
    let app = apps.get(id.trim());
    progress.finish_and_clear();
    print_app(&app.context("Failed to fetch custom app")?);
    Ok(())
}

fn print_app(app: &CustomAppPayload) {
    println!("{}", app.name.as_str().bold());
    println!("  id:                  {}", app.id);
    println!("  install type:        {}", app.install_type);
    println!("  install enforcement: {}", app.install_enforcement);
    if let Some(location) = app.unzip_location.as_deref().filter(|l| !l.is_empty()) {
        println!("  unzip location:      {location}");
    }
    println!("  active:              {}", app.active);
    println!("  restart:             {}", app.restart);
    println!("  self service:        {}", app.show_in_self_service);
    println!("  file key:            {}", app.file_key);
    println!("  sha256:              {}", app.sha256);
    println!("  size:                {} bytes", app.file_size);
    println!("  updated:             {}", app.updated_at.to_rfc3339());
}

/// Upload a local file, then create an app that references it.
fn handle_create(apps: &CustomAppsResource) -> Result<()> {
    let path: String = Input::new().with_prompt("App file path").interact_text()?;
    let path = PathBuf::from(path.trim());

    let progress = start_spinner("Uploading...")?;
    let ticket = apps.upload_file(&path);
    progress.finish_and_clear();
    let ticket = ticket.with_context(|| format!("Upload of {} failed", path.display()))?;
    println!("{}", "Upload successful".green());

    let default_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| ticket.name.clone());
    let name: String = Input::new()
        .with_prompt("App name")
        .default(default_name)
        .interact_text()?;

    let install_type = InstallType::ALL[Select::new()
        .with_prompt("Install type")
        .items(&InstallType::ALL)
        .default(0)
        .interact()?];
    let install_enforcement = select_enforcement(0)?;

    let mut app = NewCustomApp::new(
        name,
        ticket.file_key,
        install_type.as_str(),
        install_enforcement.as_str(),
    );
    if install_type == InstallType::Zip {
        app.unzip_location = Some(Input::new().with_prompt("Unzip location").interact_text()?);
    }
    if install_enforcement == InstallEnforcement::ContinuouslyEnforce {
        app.audit_script = Input::new()
            .with_prompt("Audit script")
            .allow_empty(true)
            .interact_text()?;
    }
    app.restart = Confirm::new()
        .with_prompt("Restart after install?")
        .default(false)
        .interact()?;
    app.active = Confirm::new().with_prompt("Active?").default(true).interact()?;
    app.show_in_self_service = Some(
        Confirm::new()
            .with_prompt("Show in Self Service?")
            .default(false)
            .interact()?,
    );

    let progress = start_spinner("Creating custom app...")?;
    let created = apps.create(&app);
    progress.finish_and_clear();
    print_app(&created.context("Failed to create custom app")?);
    Ok(())
}

fn select_enforcement(default: usize) -> Result<InstallEnforcement> {
    let index = Select::new()
        .with_prompt("Install enforcement")
        .items(&InstallEnforcement::ALL)
        .default(default)
        .interact()?;
    Ok(InstallEnforcement::ALL[index])
}

/// Let the user pick an app from the full list.
fn pick_app(apps: &CustomAppsResource) -> Result<Option<CustomAppPayload>> {
    let progress = start_spinner("Fetching custom apps...")?;
    let list = apps.list();
    progress.finish_and_clear();
    let mut list = list.context("Failed to list custom apps")?;

    if list.results.is_empty() {
        println!("No custom apps found.");
        return Ok(None);
    }
    let labels: Vec<String> = list
        .results
        .iter()
        .map(|app| format!("{} ({})", app.name, app.id))
        .collect();
    let index = Select::new()
        .with_prompt("Custom app")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(Some(list.results.swap_remove(index)))
}

fn handle_update(apps: &CustomAppsResource) -> Result<()> {
    let Some(app) = pick_app(apps)? else {
        return Ok(());
    };

    let fields = [
        "Name",
        "Active",
        "Restart",
        "Install enforcement",
        "Show in Self Service",
    ];
    let chosen = MultiSelect::new()
        .with_prompt("Fields to change (space to toggle)")
        .items(&fields)
        .interact()?;

    let mut changes = CustomAppUpdate::default();
    for field in chosen {
        match field {
            0 => {
                let name: String = Input::new()
                    .with_prompt("Name")
                    .default(app.name.clone())
                    .interact_text()?;
                changes.name = Some(name);
            }
            1 => {
                let active = Confirm::new()
                    .with_prompt("Active?")
                    .default(app.active)
                    .interact()?;
                changes.active = Some(active);
            }
            2 => {
                let restart = Confirm::new()
                    .with_prompt("Restart after install?")
                    .default(app.restart)
                    .interact()?;
                changes.restart = Some(restart);
            }
            3 => {
                let current = InstallEnforcement::ALL
                    .iter()
                    .position(|e| *e == app.install_enforcement)
                    .unwrap_or(0);
                let enforcement = select_enforcement(current)?;
                changes.install_enforcement = Some(enforcement.as_str().to_string());
                if enforcement == InstallEnforcement::ContinuouslyEnforce {
                    let script: String = Input::new()
                        .with_prompt("Audit script")
                        .default(app.audit_script.clone())
                        .allow_empty(true)
                        .interact_text()?;
                    changes.audit_script = Some(script);
                }
            }
            _ => {
                changes.show_in_self_service = Some(
                    Confirm::new()
                        .with_prompt("Show in Self Service?")
                        .default(app.show_in_self_service)
                        .interact()?,
                )
            }
        }
    }

    if changes.is_empty() {
        println!("No changes selected.");
        return Ok(());
    }

    let progress = start_spinner("Updating custom app...")?;
    let updated = apps.update(&app.id, &changes);
    progress.finish_and_clear();
    print_app(&updated.context("Failed to update custom app")?);
    Ok(())
}

fn handle_delete(apps: &CustomAppsResource) -> Result<()> {
    let Some(app) = pick_app(apps)? else {
        return Ok(());
    };
    let confirmed = Confirm::new()
        .with_prompt(format!("Delete {}?", app.name))
        .default(false)
        .interact()?;
    if !confirmed {
        return Ok(());
    }

    let progress = start_spinner("Deleting custom app...")?;
    let result = apps.delete(&app.id);
    progress.finish_and_clear();
    result.context("Failed to delete custom app")?;
    println!("{}", format!("Deleted {}", app.name).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_spinner_can_be_used_repeatedly_in_one_flow() {
        let progress = start_spinner("Uploading...").unwrap();
        assert_eq!(progress.message(), "Uploading...");
        progress.finish_and_clear();

        let progress = start_spinner("Creating custom app...").unwrap();
        assert_eq!(progress.message(), "Creating custom app...");
        progress.finish_and_clear();
        assert!(progress.is_finished());
    }
}
