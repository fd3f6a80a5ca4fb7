//! Turns a `WeatherResult` into the values the front-end shows.

use image::{DynamicImage, imageops::FilterType};
use tracing::warn;

use crate::{
    model::{Condition, WeatherResult},
    provider::IconFetcher,
};

/// Edge length the icon is scaled to before display.
pub const ICON_DISPLAY_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackgroundCategory {
    #[default]
    Neutral,
    Warm,
    Neutral2,
    Cool,
}

impl BackgroundCategory {
    pub fn for_condition(condition: &Condition) -> Self {
        match condition {
            Condition::Clear => BackgroundCategory::Warm,
            Condition::Clouds => BackgroundCategory::Neutral2,
            Condition::Rain | Condition::Drizzle | Condition::Thunderstorm => {
                BackgroundCategory::Cool
            }
            Condition::Other(_) => BackgroundCategory::Neutral,
        }
    }

    /// Background color as `#rrggbb`.
    pub fn hex_color(&self) -> &'static str {
        match self {
            BackgroundCategory::Neutral => "#f5f7fb",
            BackgroundCategory::Warm => "#fff7b2",
            BackgroundCategory::Neutral2 => "#e6e6e6",
            BackgroundCategory::Cool => "#cfe8ff",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundCategory::Neutral => "neutral",
            BackgroundCategory::Warm => "warm",
            BackgroundCategory::Neutral2 => "gray",
            BackgroundCategory::Cool => "cool",
        }
    }
}

/// Everything the front-end needs to render one query outcome.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub status_text: String,
    pub temperature_text: String,
    /// The single current icon; replaced wholesale on the next query.
    pub icon: Option<DynamicImage>,
    pub background: BackgroundCategory,
    pub caption: Option<String>,
}

/// Second call required after a successful weather fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRequest {
    pub icon_code: String,
}

/// Pure mapping from a query result to display values and an optional icon request.
pub fn map(result: &WeatherResult) -> (DisplayState, Option<IconRequest>) {
    match result {
        WeatherResult::Success(report) => {
            let state = DisplayState {
                status_text: report.description.clone(),
                temperature_text: format_temperature(report.temperature_c),
                icon: None,
                background: BackgroundCategory::for_condition(&report.condition),
                caption: Some(format!("Updated for {}", report.location_name)),
            };
            let icon = (!report.icon_code.trim().is_empty())
                .then(|| IconRequest { icon_code: report.icon_code.clone() });
            (state, icon)
        }
        WeatherResult::NotFound { message } => {
            (error_state(format!("City not found: {message}")), None)
        }
        WeatherResult::NetworkError { message } => {
            (error_state(format!("Network error: {message}")), None)
        }
        WeatherResult::UnexpectedError { message } => {
            (error_state(format!("Error: {message}")), None)
        }
    }
}

/// `map` plus the icon fetch. An icon failure only leaves the icon slot empty.
pub async fn present(result: &WeatherResult, icons: &dyn IconFetcher) -> DisplayState {
    let (mut state, request) = map(result);

    if let Some(request) = request {
        match icons.fetch_icon(&request.icon_code).await {
            Ok(icon) => {
                let icon =
                    icon.resize_exact(ICON_DISPLAY_SIZE, ICON_DISPLAY_SIZE, FilterType::Lanczos3);
                state.icon = Some(icon);
            }
            Err(err) => warn!(icon_code = %request.icon_code, error = %err, "icon unavailable"),
        }
    }

    state
}

pub fn format_temperature(celsius: f64) -> String {
    format!("{celsius:.1}°C")
}

fn error_state(status_text: String) -> DisplayState {
    DisplayState { status_text, ..DisplayState::default() }
}
