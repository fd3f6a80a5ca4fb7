use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::error::Error as _;
use tracing::{debug, info, warn};

use crate::{
    config::ServiceConfig,
    error::{ConfigError, IconFetchError},
    model::{Condition, WeatherQuery, WeatherReport, WeatherResult},
};

use super::{IconFetcher, WeatherService};

/// OpenWeatherMap client for current conditions and condition icons.
#[derive(Debug, Clone)]
pub struct OpenWeatherService {
    config: ServiceConfig,
    http: Client,
}

impl OpenWeatherService {
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ConfigError::Client)?;

        Ok(Self { config, http })
    }

    /// Icon URL for the fixed 2x resolution variant.
    pub fn icon_url(&self, icon_code: &str) -> String {
        format!("{}/{}@2x.png", self.config.icon_url, icon_code)
    }

    async fn fetch_current(&self, query: &WeatherQuery) -> WeatherResult {
        debug!(city = query.city(), url = %self.config.weather_url, "requesting current weather");

        let res = match self
            .http
            .get(&self.config.weather_url)
            .query(&[
                ("q", query.city()),
                ("appid", self.config.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => return self.transport_failure(err),
        };

        let status = res.status();
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => return self.transport_failure(err),
        };

        classify_response(query.city(), status, &body)
    }

    fn transport_failure(&self, err: reqwest::Error) -> WeatherResult {
        let message = if err.is_timeout() {
            format!("request timed out after {:?}", self.config.timeout)
        } else {
            describe_transport_error(err)
        };

        warn!(%message, "weather request failed in transport");
        WeatherResult::network(message)
    }
}

#[async_trait]
impl WeatherService for OpenWeatherService {
    async fn fetch(&self, city: &str) -> WeatherResult {
        let Some(query) = WeatherQuery::parse(city) else {
            return WeatherResult::unexpected("city required");
        };

        let result = self.fetch_current(&query).await;
        match &result {
            WeatherResult::Success(report) => info!(
                city = query.city(),
                condition = %report.condition,
                temperature_c = report.temperature_c,
                "weather fetched"
            ),
            WeatherResult::NotFound { message } => {
                info!(city = query.city(), %message, "city not found")
            }
            WeatherResult::NetworkError { .. } => {}
            WeatherResult::UnexpectedError { message } => {
                warn!(city = query.city(), %message, "unexpected weather response")
            }
        }

        result
    }
}

#[async_trait]
impl IconFetcher for OpenWeatherService {
    async fn fetch_icon(&self, icon_code: &str) -> Result<DynamicImage, IconFetchError> {
        let icon_code = icon_code.trim();
        if icon_code.is_empty() {
            return Err(IconFetchError::EmptyCode);
        }

        let url = self.icon_url(icon_code);
        debug!(%url, "requesting condition icon");

        let res = self.http.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(IconFetchError::Status(status));
        }

        let bytes = res.bytes().await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

#[derive(Debug, Deserialize)]
struct OwEnvelope {
    #[serde(default)]
    cod: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl OwEnvelope {
    /// `cod` arrives as a number on success and as a string on errors.
    fn code(&self) -> Option<u64> {
        match self.cod.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn message(&self) -> Option<String> {
        self.message
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dt: Option<i64>,
    main: OwMain,
    weather: Vec<OwWeather>,
}

/// Map an HTTP status and body onto a `WeatherResult`.
fn classify_response(city: &str, status: StatusCode, body: &str) -> WeatherResult {
    let envelope = serde_json::from_str::<OwEnvelope>(body).ok();
    let api_code = envelope.as_ref().and_then(OwEnvelope::code);
    let api_message = envelope.as_ref().and_then(OwEnvelope::message);

    if status == StatusCode::NOT_FOUND || api_code == Some(404) {
        return WeatherResult::not_found(api_message.unwrap_or_else(|| "city not found".into()));
    }

    if !status.is_success() {
        if api_message.is_none() {
            debug!(%status, body = %truncate_body(body), "error response without API message");
        }
        return WeatherResult::unexpected(
            api_message.unwrap_or_else(|| format!("Unable to fetch weather data (HTTP {status})")),
        );
    }

    match api_code {
        Some(200) | None => {}
        Some(code) => {
            return WeatherResult::unexpected(
                api_message
                    .unwrap_or_else(|| format!("Unable to fetch weather data (code {code})")),
            );
        }
    }

    let parsed: OwCurrentResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return WeatherResult::unexpected(format!("Failed to parse weather response: {err}"));
        }
    };

    let Some(weather) = parsed.weather.into_iter().next() else {
        return WeatherResult::unexpected("Weather response contained no conditions");
    };

    let observed_at = parsed
        .dt
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let location_name = parsed
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| city.to_string());

    WeatherResult::Success(WeatherReport {
        location_name,
        temperature_c: parsed.main.temp,
        condition: Condition::parse(&weather.main),
        description: weather.description,
        icon_code: weather.icon,
        observed_at,
    })
}

/// Error text without the request URL, which carries the API key.
fn describe_transport_error(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{io::Cursor, net::TcpListener, time::Duration};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    const WEATHER_PATH: &str = "/data/2.5/weather";

    fn service_for(server: &MockServer) -> OpenWeatherService {
        let mut config = ServiceConfig::new("TEST_KEY");
        config.weather_url = format!("{}{WEATHER_PATH}", server.uri());
        config.icon_url = format!("{}/img/wn", server.uri());
        config.timeout = Duration::from_millis(300);
        OpenWeatherService::new(config).expect("client must build")
    }

    fn current_body(main: &str) -> Value {
        json!({
            "cod": 200,
            "name": "London",
            "dt": 1_700_000_000,
            "main": { "temp": 11.46, "feels_like": 10.2, "humidity": 81 },
            "weather": [{ "id": 500, "main": main, "description": "light rain", "icon": "10d" }]
        })
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 200, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn success_sends_metric_query_and_parses_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .and(query_param("q", "London"))
            .and(query_param("appid", "TEST_KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Rain")))
            .expect(1)
            .mount(&server)
            .await;

        let result = service_for(&server).fetch("  London ").await;

        let WeatherResult::Success(report) = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(report.location_name, "London");
        assert_eq!(report.temperature_c, 11.46);
        assert_eq!(report.condition, Condition::Rain);
        assert_eq!(report.description, "light rain");
        assert_eq!(report.icon_code, "10d");
        assert_eq!(report.observed_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn blank_city_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let service = service_for(&server);
        for city in ["", "   ", "\t\n"] {
            assert_eq!(service.fetch(city).await, WeatherResult::unexpected("city required"));
        }
    }

    #[tokio::test]
    async fn http_404_is_not_found_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&server)
            .await;

        let result = service_for(&server).fetch("Atlantis").await;

        assert_eq!(result, WeatherResult::not_found("city not found"));
    }

    #[tokio::test]
    async fn timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(current_body("Clear"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let result = service_for(&server).fetch("London").await;

        let WeatherResult::NetworkError { message } = result else {
            panic!("expected network error, got {result:?}");
        };
        assert!(message.contains("timed out"), "{message}");
        assert!(!message.contains("TEST_KEY"));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error_without_key() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut config = ServiceConfig::new("TEST_KEY");
        config.weather_url = format!("http://127.0.0.1:{port}{WEATHER_PATH}");
        config.timeout = Duration::from_secs(2);
        let service = OpenWeatherService::new(config).unwrap();

        let result = service.fetch("London").await;

        let WeatherResult::NetworkError { message } = result else {
            panic!("expected network error, got {result:?}");
        };
        assert!(message.starts_with("error sending request"), "{message}");
        assert!(!message.contains("timed out"), "{message}");
        assert!(!message.contains("TEST_KEY"), "{message}");
    }

    #[test]
    fn cod_404_inside_success_status_is_not_found() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        assert_eq!(
            classify_response("x", StatusCode::OK, body),
            WeatherResult::not_found("city not found")
        );
    }

    #[test]
    fn not_found_without_body_uses_fallback_message() {
        assert_eq!(
            classify_response("x", StatusCode::NOT_FOUND, "<html>nope</html>"),
            WeatherResult::not_found("city not found")
        );
    }

    #[test]
    fn rate_limit_is_unexpected_error() {
        let body = r#"{"cod":429,"message":"Your account is temporary blocked"}"#;
        assert_eq!(
            classify_response("x", StatusCode::TOO_MANY_REQUESTS, body),
            WeatherResult::unexpected("Your account is temporary blocked")
        );
    }

    #[test]
    fn server_error_without_message_falls_back_to_generic_text() {
        let html = "<html><head><title>502 Bad Gateway</title></head><body>nginx</body></html>";
        assert_eq!(
            classify_response("x", StatusCode::BAD_GATEWAY, html),
            WeatherResult::unexpected("Unable to fetch weather data (HTTP 502 Bad Gateway)")
        );
        assert_eq!(
            classify_response("x", StatusCode::INTERNAL_SERVER_ERROR, ""),
            WeatherResult::unexpected(
                "Unable to fetch weather data (HTTP 500 Internal Server Error)"
            )
        );
    }

    #[test]
    fn malformed_success_body_is_unexpected_error() {
        let bodies = [
            "not json",
            r#"{"cod":200,"main":{}}"#,
            r#"{"main":{"temp":1.0},"weather":[]}"#,
        ];
        for body in bodies {
            let result = classify_response("x", StatusCode::OK, body);
            assert!(
                matches!(result, WeatherResult::UnexpectedError { .. }),
                "{body}: {result:?}"
            );
        }
    }

    #[test]
    fn missing_name_falls_back_to_query_city() {
        let body = r#"{
            "main": { "temp": -3.0 },
            "weather": [{ "main": "Snow", "description": "snow", "icon": "13n" }]
        }"#;
        let result = classify_response("Tromsø", StatusCode::OK, body);
        let WeatherResult::Success(report) = result else {
            panic!("expected success");
        };
        assert_eq!(report.location_name, "Tromsø");
        assert_eq!(report.condition, Condition::Other("Snow".into()));
    }

    #[tokio::test]
    async fn icon_is_downloaded_and_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/wn/10d@2x.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
            .expect(1)
            .mount(&server)
            .await;

        let icon = service_for(&server).fetch_icon("10d").await.unwrap();

        assert_eq!((icon.width(), icon.height()), (4, 4));
    }

    #[tokio::test]
    async fn icon_errors_are_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/wn/missing@2x.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/wn/garbage@2x.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a png".to_vec()))
            .mount(&server)
            .await;

        let service = service_for(&server);

        assert!(matches!(service.fetch_icon(" ").await, Err(IconFetchError::EmptyCode)));
        assert!(matches!(
            service.fetch_icon("missing").await,
            Err(IconFetchError::Status(StatusCode::NOT_FOUND))
        ));
        assert!(matches!(service.fetch_icon("garbage").await, Err(IconFetchError::Decode(_))));
    }
}
