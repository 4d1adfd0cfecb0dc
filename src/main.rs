// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, resolve configuration and hand
//   an opened resource to the UI loop.
// - Returns `anyhow::Result` so library errors surface with context.

use anyhow::Context;
use kst_apps::{ui, CustomAppsResource, Resource};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with prompts on stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ui::resolve_config()?;
    let mut apps = CustomAppsResource::new(config);

    // Both sessions are closed when `open` drops, even if the menu fails.
    let open = apps.enter().context("Failed to open API sessions")?;
    ui::main_menu(&open)
}
