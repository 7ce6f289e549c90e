//! Catalogue console
//!
//! Signs in against the catalogue REST API and performs an initial sync of the
//! course list.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalogue_console::sync::Scope;
use catalogue_console::{Config, Console};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting catalogue console");

    if config.api_token.is_none() {
        tracing::warn!("No API token configured (CATALOGUE_API_TOKEN). Requests are anonymous!");
    }

    let console = Console::new(&config)?;
    tracing::info!("API base URL: {}", console.gateway.base_url());

    let user = console.load_current_user().await?;
    tracing::info!("Session user: {} <{}>", user.display_name(), user.email);

    console.courses.fetch(Scope::all()).await?;
    tracing::info!(
        "Loaded {} of {} courses (more available: {})",
        console.courses.select_all().len(),
        console.courses.count(),
        console.courses.has_more()
    );

    console.tags.fetch(Scope::all()).await?;
    tracing::info!(
        "Loaded {} tags ({})",
        console.tags.count(),
        console.tags.loading_state().as_str()
    );

    Ok(())
}
