use async_trait::async_trait;
use image::DynamicImage;
use std::fmt::Debug;

use crate::{error::IconFetchError, model::WeatherResult};

pub mod openweather;

/// Performs one weather lookup per call and folds every failure into the result.
#[async_trait]
pub trait WeatherService: Send + Sync + Debug {
    async fn fetch(&self, city: &str) -> WeatherResult;
}

/// Downloads and decodes a condition icon.
#[async_trait]
pub trait IconFetcher: Send + Sync + Debug {
    async fn fetch_icon(&self, icon_code: &str) -> Result<DynamicImage, IconFetchError>;
}
