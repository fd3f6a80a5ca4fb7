use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, Text};
use std::sync::Arc;
use tracing::info;
use weather_now_core::{
    Config, DisplayState, Dispatcher, OpenWeatherService, Session, config::API_KEY_VAR,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-now", version, about = "Current weather for a city, from OpenWeatherMap")]
pub struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an OpenWeatherMap API key in the config file.
    Configure,

    /// Show the current weather for one city and exit.
    Show {
        /// City name, e.g. "London" or "Paris,FR".
        city: String,
    },

    /// Prompt for cities until cancelled (the default).
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Interactive) {
            Command::Configure => configure(),
            Command::Show { city } => {
                let (mut session, mut dispatcher) = start()?;
                submit(&mut session, &mut dispatcher, city).await;
                Ok(())
            }
            Command::Interactive => {
                let (mut session, mut dispatcher) = start()?;
                interactive(&mut session, &mut dispatcher).await
            }
        }
    }
}

/// Resolve credentials once; a missing key stops here, before any query.
fn start() -> anyhow::Result<(Session, Dispatcher)> {
    let config = Config::load()?;
    let dotenv = std::env::current_dir()
        .context("Failed to determine working directory")?
        .join(".env");

    let service_config = config.service_config(std::env::var(API_KEY_VAR).ok(), &dotenv)?;
    info!(?service_config, "service configured");

    let service = Arc::new(OpenWeatherService::new(service_config)?);
    Ok((Session::new(), Dispatcher::new(service.clone(), service)))
}

fn configure() -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let mut config = Config::load()?;
    config.set_api_key(api_key);
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn interactive(session: &mut Session, dispatcher: &mut Dispatcher) -> anyhow::Result<()> {
    println!("Weather Now");
    println!("Enter a city and press Enter. Esc or Ctrl-C quits.");

    loop {
        let input = tokio::task::spawn_blocking(|| Text::new("City:").prompt())
            .await
            .context("City prompt task failed")?;

        let city = match input {
            Ok(city) => city,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(());
            }
            Err(err) => return Err(err).context("Failed to read city"),
        };

        submit(session, dispatcher, city).await;
    }
}

async fn submit(session: &mut Session, dispatcher: &mut Dispatcher, city: String) {
    let ticket = session.submit();
    println!("Fetching weather…");
    dispatcher.dispatch(ticket, city);

    if let Some(state) = dispatcher.settle(session).await {
        render(state);
    }
}

fn render(state: &DisplayState) {
    let temperature = if state.temperature_text.is_empty() {
        "— °C"
    } else {
        state.temperature_text.as_str()
    };

    println!();
    println!("  {temperature}");
    println!("  {}", state.status_text);
    if let Some(icon) = &state.icon {
        println!("  icon: {}x{}", icon.width(), icon.height());
    }
    println!(
        "  background: {} ({})",
        state.background.as_str(),
        state.background.hex_color()
    );
    if let Some(caption) = &state.caption {
        println!("  {caption} at {}", Local::now().format("%H:%M:%S"));
    }
    println!();
}
