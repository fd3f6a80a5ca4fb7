use reqwest::StatusCode;
use thiserror::Error;

/// Startup-time configuration problems. Reported once, never per query.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "No OpenWeatherMap API key found.\n\
         Hint: set OWM_API_KEY, add `OWM_API_KEY=your_key` to a .env file, \
         or run `weather-now configure`."
    )]
    MissingApiKey,

    #[error("Request timeout must be at least one second")]
    InvalidTimeout,

    #[error("Failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Icon download or decode failure. Never fatal to a successful query.
#[derive(Debug, Error)]
pub enum IconFetchError {
    #[error("no icon code in the weather response")]
    EmptyCode,

    #[error("icon request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("icon request returned HTTP {0}")]
    Status(StatusCode),

    #[error("icon could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}
