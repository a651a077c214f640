//! Translation tables for every user facing string.
//!
//! The tables are embedded JSON documents, parsed once on first use and never mutated afterwards.
//! Keys are dot separated paths into them, e.g. `events.tugofwar`.

use std::{fmt, sync::OnceLock};

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Formatter, Path, UriDisplay},
    },
    request::FromParam,
};
use serde::Serialize;
use serde_json::Value;

/// A language the pages are available in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ja,
}

/// The locale used whenever a requested one (or a key in it) is unavailable.
pub const FALLBACK: Locale = Locale::En;

impl Locale {
    pub const ALL: [Self; 2] = [Self::En, Self::Ja];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
        }
    }

    /// Parses a locale tag, tolerating case and region suffixes like `ja-JP`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let language = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|locale| locale.as_str() == language)
    }

    fn table(self) -> &'static Value {
        static EN: OnceLock<Value> = OnceLock::new();
        static JA: OnceLock<Value> = OnceLock::new();

        match self {
            Self::En => EN.get_or_init(|| parse_table("en", include_str!("../locales/en.json"))),
            Self::Ja => JA.get_or_init(|| parse_table("ja", include_str!("../locales/ja.json"))),
        }
    }
}

impl<'a> FromParam<'a> for Locale {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        Self::parse(param).ok_or(param)
    }
}

impl UriDisplay<Path> for Locale {
    fn fmt(&self, f: &mut Formatter<'_, Path>) -> fmt::Result {
        f.write_value(self.as_str())
    }
}

impl_from_uri_param_identity!([Path] Locale);

fn parse_table(name: &str, source: &str) -> Value {
    serde_json::from_str(source).unwrap_or_else(|err| {
        log::error!("Translation table '{name}' is not valid JSON: {err}");
        Value::Null
    })
}

fn walk<'v>(table: &'v Value, key: &str) -> Option<&'v str> {
    key.split('.')
        .try_fold(table, |node, segment| node.get(segment))?
        .as_str()
}

/// Looks up `key` in the table of `locale`, falling back to [`FALLBACK`] and finally to the key
/// itself.
#[must_use]
pub fn lookup<'k>(locale: Locale, key: &'k str) -> &'k str {
    walk(locale.table(), key)
        .or_else(|| walk(FALLBACK.table(), key))
        .unwrap_or(key)
}

/// Like [`lookup`], but replaces `{{name}}` placeholders with the given values.
#[must_use]
pub fn format(locale: Locale, key: &str, args: &[(&str, String)]) -> String {
    args.iter()
        .fold(lookup(locale, key).to_string(), |text, (name, value)| {
            text.replace(&format!("{{{{{name}}}}}"), value)
        })
}
