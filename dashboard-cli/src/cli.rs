use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dashboard_core::{
    CityList, Config, Dashboard, ProviderId, WeatherProvider,
    provider::{default_provider_from_config, provider_from_config},
};
use inquire::{Confirm, Password, Text};
use tokio::time::Instant;

use crate::{session::Session, view};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    /// Provider to use instead of the configured default ("open-meteo" or "weatherapi").
    #[arg(long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "open-meteo" or "weatherapi".
        provider: String,
    },

    /// Fetch every city once and print the cards.
    Show {
        /// City to show; repeat for several. Defaults to the configured list.
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Print cards as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Run the interactive dashboard with background refresh.
    Watch {
        /// City to start with; repeat for several. Defaults to the configured list.
        #[arg(long = "city")]
        cities: Vec<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { cities, json } => {
                let config = Config::load()?;
                let provider = resolve_provider(self.provider.as_deref(), &config)?;
                show(&config, provider, cities, json).await
            }
            Command::Watch { cities } => {
                let config = Config::load()?;
                let provider = resolve_provider(self.provider.as_deref(), &config)?;
                let locator = config.geolocation.source()?;
                let dashboard =
                    Dashboard::with_banner_ttl(initial_cities(&config, cities), config.banner_ttl());

                Session::new(dashboard, provider, locator.into(), &config)
                    .run()
                    .await
            }
        }
    }
}

fn resolve_provider(
    flag: Option<&str>,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    match flag {
        Some(name) => provider_from_config(ProviderId::try_from(name)?, config),
        None => default_provider_from_config(config),
    }
}

fn initial_cities(config: &Config, overrides: Vec<String>) -> CityList {
    if overrides.is_empty() {
        CityList::from_names(&config.cities)
    } else {
        CityList::from_names(overrides)
    }
}

async fn show(
    config: &Config,
    provider: Arc<dyn WeatherProvider>,
    cities: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::with_banner_ttl(initial_cities(config, cities), config.banner_ttl());

    let cycle = dashboard.begin_cycle();
    let report = cycle.run(provider.as_ref()).await;
    dashboard.finish_cycle(report, Instant::now());

    if json {
        let out = serde_json::to_string_pretty(dashboard.cards())
            .context("Failed to serialize cards to JSON")?;
        println!("{out}");
        for banner in dashboard.active_banners(Instant::now()) {
            eprintln!("{}", banner.message);
        }
    } else {
        print!("{}", view::draw(&mut dashboard, Instant::now()));
    }

    Ok(())
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.requires_api_key() {
        let keep_hint = if config.is_provider_configured(id) {
            "Leave empty to keep the current key"
        } else {
            "Get a free key at https://www.weatherapi.com/"
        };
        let api_key = Password::new(&format!("API key for {id}:"))
            .without_confirmation()
            .with_help_message(keep_hint)
            .prompt()
            .context("API key prompt was cancelled")?;
        let api_key = api_key.trim().to_string();
        if !api_key.is_empty() {
            config.upsert_provider_api_key(id, api_key);
        } else if !config.is_provider_configured(id) {
            anyhow::bail!("API key must not be empty");
        }
    }

    let mut entry = config.provider_config(id).cloned().unwrap_or_default();
    match id {
        ProviderId::OpenMeteo => {
            entry.base_url = prompt_url("Forecast API base URL", entry.base_url.as_deref())?;
            entry.geocoding_url =
                prompt_url("City search API base URL", entry.geocoding_url.as_deref())?;
            entry.reverse_geocoding_url = prompt_url(
                "Reverse geocoding (Nominatim) base URL",
                entry.reverse_geocoding_url.as_deref(),
            )?;
        }
        ProviderId::WeatherApi => {
            entry.base_url = prompt_url("API base URL", entry.base_url.as_deref())?;
        }
    }
    config.providers.insert(id.as_str().to_string(), entry);

    let is_default = config.default_provider_id().ok() == Some(id);
    if !is_default {
        let make_default = Confirm::new(&format!("Use {id} by default?"))
            .with_default(true)
            .prompt()
            .context("Default provider prompt was cancelled")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    let path = config.save()?;
    println!("Saved {id} configuration to {}", path.display());
    Ok(())
}

/// Empty input means the public endpoint.
fn prompt_url(label: &str, current: Option<&str>) -> anyhow::Result<Option<String>> {
    let url = Text::new(&format!("{label} (leave empty for the public endpoint):"))
        .with_initial_value(current.unwrap_or_default())
        .prompt()
        .with_context(|| format!("{label} prompt was cancelled"))?;

    Ok(Some(url.trim().to_string()).filter(|u| !u.is_empty()))
}
