//! Core library for the `weather-now` utility.
//!
//! This crate defines:
//! - Configuration & credential resolution
//! - The OpenWeatherMap query service and icon fetcher
//! - Mapping of query results to display state
//! - The submit lifecycle with superseded-request handling
//!
//! It is used by `weather-now-cli`, but any front-end can drive it: feed a
//! city into a [`Session`]/[`Dispatcher`] pair and render the [`DisplayState`].

pub mod config;
pub mod error;
pub mod model;
pub mod presentation;
pub mod provider;
pub mod session;

pub use config::{Config, ServiceConfig};
pub use error::{ConfigError, IconFetchError};
pub use model::{Condition, WeatherQuery, WeatherReport, WeatherResult};
pub use presentation::{BackgroundCategory, DisplayState};
pub use provider::{IconFetcher, WeatherService, openweather::OpenWeatherService};
pub use session::{Completion, Dispatcher, Phase, Session, Ticket};
