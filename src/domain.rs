use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const SPECIAL_REPORT_TYPE: &str = "Special Report";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTerm {
    #[serde(rename = "name")]
    pub canonical_name: String,
    #[serde(rename = "id")]
    pub raw_id: String,
}

impl RawTerm {
    pub fn new(canonical_name: impl Into<String>, raw_id: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            raw_id: raw_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub(crate) fn from_hyphenated(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for ExternalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AlternativeIdentifiers {
    #[serde(rename = "TME", skip_serializing_if = "Vec::is_empty")]
    pub tme: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uuids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialReport {
    pub uuid: String,
    pub alternative_identifiers: AlternativeIdentifiers,
    pub pref_label: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialReportLink {
    #[serde(rename = "apiUrl")]
    pub api_url: String,
}

impl SpecialReportLink {
    pub fn new(base_url: &str, id: &ExternalId) -> Self {
        Self {
            api_url: format!("{base_url}{id}"),
        }
    }
}
