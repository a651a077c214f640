use {
    crate::{mail::MailConfig, submissions::DuplicateGuard, track::TrackRules},
    rocket::serde::Deserialize,
};

#[derive(Debug, Deserialize)]
pub struct Config {
    /// The public URL of this server, used to build the checkout redirect URLs.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Secret key of the Stripe account. Without it, checkouts go to the mock gateway.
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Currency of the checkout, as ISO code in lower case.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Shown as product name on the checkout page and as sender of confirmation mails.
    #[serde(default = "default_event_name")]
    pub event_name: String,

    /// Minimum age of the representative on the open track.
    #[serde(default)]
    pub open_min_age: u8,

    /// Minimum age of the representative on the waiting list.
    #[serde(default = "default_waiting_list_min_age")]
    pub waiting_list_min_age: u8,

    /// For how long a second checkout of the same person is flagged as possible duplicate.
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: i64,

    /// The account confirmation mails are sent from. No mails are sent without it.
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_event_name() -> String {
    "Sports Festival Entry Fee".to_string()
}

fn default_waiting_list_min_age() -> u8 {
    TrackRules::default().waiting_list_min_age
}

fn default_duplicate_window_secs() -> i64 {
    DuplicateGuard::DEFAULT_WINDOW_SECS
}

impl Config {
    #[must_use]
    pub const fn track_rules(&self) -> TrackRules {
        TrackRules {
            open_min_age: self.open_min_age,
            waiting_list_min_age: self.waiting_list_min_age,
        }
    }

    #[must_use]
    pub fn duplicate_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duplicate_window_secs.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{providers::Serialized, Figment};

    #[test]
    fn defaults_apply() {
        let config: Config = Figment::from(Serialized::defaults(serde_json::json!({})))
            .extract()
            .unwrap();

        assert_eq!(config.track_rules(), TrackRules::default());
        assert_eq!(config.duplicate_window(), chrono::Duration::minutes(5));
        assert_eq!(config.currency, "usd");
        assert!(config.stripe_secret_key.is_none());
        assert!(config.mail.is_none());
    }

    #[test]
    fn nested_mail_account() {
        let config: Config = Figment::from(Serialized::defaults(serde_json::json!({
            "open_min_age": 5,
            "mail": {
                "email": "festival@non-existent-domain",
                "email_creds": "hunter2",
                "smtp_server": "smtp.non-existent-domain"
            }
        })))
        .extract()
        .unwrap();

        assert_eq!(config.track_rules().open_min_age, 5);
        assert_eq!(
            config.mail.unwrap().email.to_string(),
            "festival@non-existent-domain"
        );
    }
}
