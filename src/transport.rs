//! The flat, string keyed form a registration takes while travelling between wizard pages.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use rocket::http::uri::fmt::{Formatter, Query, UriDisplay};
use serde::Serialize;

/// String parameters carried from one wizard page to the next, either as query parameters or as
/// hidden form fields. Missing keys read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WizardParams(BTreeMap<String, String>);

impl WizardParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map_or("", String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Percent-encoded `key=value&...` for use in a redirect location.
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("{}", self as &dyn UriDisplay<Query>)
    }
}

impl UriDisplay<Query> for WizardParams {
    fn fmt(&self, f: &mut Formatter<'_, Query>) -> fmt::Result {
        for (key, value) in &self.0 {
            f.write_named_value(key, value)?;
        }
        Ok(())
    }
}

impl From<HashMap<String, String>> for WizardParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self(params.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WizardParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
