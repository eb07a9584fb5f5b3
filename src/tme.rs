use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::RawTerm;
use crate::error::TransformerError;

pub trait TermSource: Send + Sync {
    fn list_page(&self, offset: usize) -> Result<Vec<RawTerm>, TransformerError>;
    fn fetch_by_raw_id(&self, raw_id: &str) -> Result<RawTerm, TransformerError>;
    fn check_connectivity(&self) -> Result<(), TransformerError>;
}

impl<T: TermSource + ?Sized> TermSource for Arc<T> {
    fn list_page(&self, offset: usize) -> Result<Vec<RawTerm>, TransformerError> {
        (**self).list_page(offset)
    }

    fn fetch_by_raw_id(&self, raw_id: &str) -> Result<RawTerm, TransformerError> {
        (**self).fetch_by_raw_id(raw_id)
    }

    fn check_connectivity(&self) -> Result<(), TransformerError> {
        (**self).check_connectivity()
    }
}

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct TmeSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub token: String,
    pub taxonomy_name: String,
    pub max_records: usize,
    pub slices: usize,
    pub request_timeout: Duration,
    pub max_retries: usize,
}

impl fmt::Debug for TmeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmeSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("token", &"<redacted>")
            .field("taxonomy_name", &self.taxonomy_name)
            .field("max_records", &self.max_records)
            .field("slices", &self.slices)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRequest {
    pub start: usize,
    pub count: usize,
}

pub fn slice_plan(offset: usize, max_records: usize, slices: usize) -> Vec<SliceRequest> {
    if max_records == 0 {
        return Vec::new();
    }
    let slices = slices.clamp(1, max_records);
    let chunk = max_records.div_ceil(slices);
    (0..slices)
        .map(|index| index * chunk)
        .take_while(|start| *start < max_records)
        .map(|start| SliceRequest {
            start: offset + start,
            count: chunk.min(max_records - start),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TaxonomyDocument {
    #[serde(rename = "term", default)]
    terms: Vec<RawTerm>,
}

pub fn parse_taxonomy(xml: &str) -> Result<Vec<RawTerm>, TransformerError> {
    let document: TaxonomyDocument =
        quick_xml::de::from_str(xml).map_err(|err| TransformerError::TmeParse(err.to_string()))?;
    Ok(document.terms)
}

pub fn parse_term(xml: &str) -> Result<RawTerm, TransformerError> {
    quick_xml::de::from_str(xml).map_err(|err| TransformerError::TmeParse(err.to_string()))
}

#[derive(Clone)]
pub struct TmeHttpClient {
    client: Client,
    base_url: Url,
    settings: TmeSettings,
}

impl TmeHttpClient {
    pub fn new(settings: TmeSettings) -> Result<Self, TransformerError> {
        let base_url = Url::parse(&settings.base_url).map_err(|err| {
            TransformerError::InvalidConfig(format!(
                "invalid TME base URL {}: {err}",
                settings.base_url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransformerError::InvalidConfig(format!(
                "TME base URL cannot be used as a base: {}",
                settings.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!(
                "special-reports-transformer/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .map_err(|err| TransformerError::InvalidConfig(err.to_string()))?,
        );
        if !settings.token.trim().is_empty() {
            headers.insert(
                "ClientToken",
                HeaderValue::from_str(settings.token.trim())
                    .map_err(|err| TransformerError::InvalidConfig(err.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransformerError::TmeHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    pub fn terms_url(&self, start: usize, count: usize) -> Url {
        let mut url = self.authority_file_url();
        url.query_pairs_mut()
            .append_pair("maximumRecords", &count.to_string())
            .append_pair("startRecord", &start.to_string());
        url
    }

    pub fn term_url(&self, raw_id: &str) -> Url {
        let mut url = self.authority_file_url();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(raw_id);
        }
        url
    }

    fn authority_file_url(&self) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "rs",
                "authorityfiles",
                self.settings.taxonomy_name.as_str(),
                "terms",
            ]);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.settings.username.is_empty() {
            return request;
        }
        request.basic_auth(&self.settings.username, Some(&self.settings.password))
    }

    fn get_text(&self, url: &Url, max_retries: usize) -> Result<String, TransformerError> {
        let mut attempt = 0usize;
        loop {
            let outcome = self.authorized(self.client.get(url.clone())).send();
            let transient = match &outcome {
                Ok(response) => is_transient_status(response.status()),
                Err(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            };
            if transient && attempt < max_retries {
                attempt += 1;
                debug!(%url, attempt, "retrying TME request");
                thread::sleep(RETRY_BACKOFF * attempt as u32);
                continue;
            }

            let response = outcome.map_err(|err| TransformerError::TmeHttp(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().unwrap_or_else(|_| status.to_string());
                return Err(TransformerError::TmeStatus {
                    status: status.as_u16(),
                    message,
                });
            }
            return response
                .text()
                .map_err(|err| TransformerError::TmeHttp(err.to_string()));
        }
    }

    fn fetch_slice(&self, slice: &SliceRequest) -> Result<Vec<RawTerm>, TransformerError> {
        let url = self.terms_url(slice.start, slice.count);
        debug!(start = slice.start, count = slice.count, "requesting TME terms");
        let body = self.get_text(&url, self.settings.max_retries)?;
        parse_taxonomy(&body)
    }
}

impl TermSource for TmeHttpClient {
    fn list_page(&self, offset: usize) -> Result<Vec<RawTerm>, TransformerError> {
        let plan = slice_plan(offset, self.settings.max_records, self.settings.slices);
        if let [single] = plan.as_slice() {
            return self.fetch_slice(single);
        }

        let results = thread::scope(|scope| {
            let handles = plan
                .iter()
                .map(|slice| scope.spawn(move || self.fetch_slice(slice)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(TransformerError::TmeHttp(
                            "TME slice worker panicked".to_string(),
                        ))
                    })
                })
                .collect::<Vec<_>>()
        });

        let mut terms = Vec::new();
        for result in results {
            terms.extend(result?);
        }
        Ok(terms)
    }

    fn fetch_by_raw_id(&self, raw_id: &str) -> Result<RawTerm, TransformerError> {
        let body = self.get_text(&self.term_url(raw_id), self.settings.max_retries)?;
        parse_term(&body)
    }

    fn check_connectivity(&self) -> Result<(), TransformerError> {
        self.get_text(&self.terms_url(0, 1), 0)?;
        Ok(())
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }
}
