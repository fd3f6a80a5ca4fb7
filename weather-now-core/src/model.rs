use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated city query: never empty, surrounding whitespace removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    city: String,
}

impl WeatherQuery {
    /// Returns `None` when the input is empty or whitespace only.
    pub fn parse(raw: &str) -> Option<Self> {
        let city = raw.trim();
        if city.is_empty() {
            return None;
        }

        Some(Self { city: city.to_string() })
    }

    pub fn city(&self) -> &str {
        &self.city
    }
}

/// Coarse condition category reported by the API (`weather[0].main`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Other(String),
}

impl Condition {
    /// Case-insensitive exact match; anything unrecognised lands in `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "clear" => Condition::Clear,
            "clouds" => Condition::Clouds,
            "rain" => Condition::Rain,
            "drizzle" => Condition::Drizzle,
            "thunderstorm" => Condition::Thunderstorm,
            _ => Condition::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Condition::Clear => "Clear",
            Condition::Clouds => "Clouds",
            Condition::Rain => "Rain",
            Condition::Drizzle => "Drizzle",
            Condition::Thunderstorm => "Thunderstorm",
            Condition::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location_name: String,
    pub temperature_c: f64,
    pub condition: Condition,
    pub description: String,
    pub icon_code: String,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of a single weather query. Failures never escape as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherResult {
    Success(WeatherReport),
    NotFound { message: String },
    NetworkError { message: String },
    UnexpectedError { message: String },
}

impl WeatherResult {
    pub fn not_found(message: impl Into<String>) -> Self {
        WeatherResult::NotFound { message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        WeatherResult::NetworkError { message: message.into() }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        WeatherResult::UnexpectedError { message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WeatherResult::Success(_))
    }
}
