use std::time::Duration;

use clap::ValueEnum;
use reqwest::Url;

use crate::catalog::CatalogSettings;
use crate::error::TransformerError;
use crate::tme::TmeSettings;

pub const TAXONOMY_NAME: &str = "SpecialReports";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/transformers/special-reports/";
pub const DEFAULT_TME_BASE_URL: &str = "https://tme.ft.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    Text,
    #[default]
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tme_username: String,
    pub tme_password: String,
    pub token: String,
    pub base_url: String,
    pub tme_base_url: String,
    pub port: u16,
    pub max_records: usize,
    pub slices: usize,
    pub request_timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tme_username: String::new(),
            tme_password: String::new(),
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            tme_base_url: DEFAULT_TME_BASE_URL.to_string(),
            port: 8080,
            max_records: 10000,
            slices: 10,
            request_timeout_secs: 30,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub port: u16,
    pub catalog: CatalogSettings,
    pub tme: TmeSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, TransformerError> {
        if config.base_url.trim().is_empty() {
            return Err(invalid("base URL must not be empty"));
        }
        if config.tme_base_url.trim().is_empty() {
            return Err(invalid("TME base URL must not be empty"));
        }
        let tme_base_url = Url::parse(config.tme_base_url.trim()).map_err(|err| {
            invalid(&format!(
                "TME base URL {} is not an absolute URL: {err}",
                config.tme_base_url
            ))
        })?;
        if config.max_records == 0 {
            return Err(invalid("max records must be greater than zero"));
        }
        if config.slices == 0 {
            return Err(invalid("slices must be greater than zero"));
        }
        if config.slices > config.max_records {
            return Err(invalid(&format!(
                "slices ({}) must not exceed max records ({})",
                config.slices, config.max_records
            )));
        }
        if config.request_timeout_secs == 0 {
            return Err(invalid("request timeout must be greater than zero"));
        }

        Ok(ResolvedConfig {
            port: config.port,
            catalog: CatalogSettings {
                base_url: config.base_url,
                taxonomy_name: TAXONOMY_NAME.to_string(),
                page_size: config.max_records,
            },
            tme: TmeSettings {
                base_url: tme_base_url.to_string(),
                username: config.tme_username,
                password: config.tme_password,
                token: config.token,
                taxonomy_name: TAXONOMY_NAME.to_string(),
                max_records: config.max_records,
                slices: config.slices,
                request_timeout: Duration::from_secs(config.request_timeout_secs),
                max_retries: config.max_retries,
            },
        })
    }
}

fn invalid(message: &str) -> TransformerError {
    TransformerError::InvalidConfig(message.to_string())
}
