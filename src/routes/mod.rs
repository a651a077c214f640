use std::collections::BTreeMap;

use rocket::Route;
use serde::Serialize;

use crate::{i18n::Locale, validation::ValidationErrors};

pub mod api;
pub mod confirm;
pub mod disclaimer;
pub mod index;
pub mod payment;
pub mod register;

#[must_use]
pub fn routes() -> Vec<Route> {
    [
        index::routes(),
        register::routes(),
        disclaimer::routes(),
        confirm::routes(),
        payment::routes(),
        api::routes(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// What the page layout needs on every page.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub lang: &'static str,
    /// The other language, for the language switch.
    pub switch_lang: &'static str,
}

impl Layout {
    #[must_use]
    pub fn new(lang: Locale) -> Self {
        Self {
            lang: lang.as_str(),
            switch_lang: match lang {
                Locale::En => Locale::Ja.as_str(),
                Locale::Ja => Locale::En.as_str(),
            },
        }
    }
}

/// Localized messages of fields that didn't validate, keyed by their path.
#[must_use]
pub fn field_messages(errors: Option<&ValidationErrors>, lang: Locale) -> BTreeMap<String, String> {
    errors.map(|errors| errors.localized(lang)).unwrap_or_default()
}
