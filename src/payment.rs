//! Hosted checkout sessions, i.e. the part where somebody else takes the money.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use rocket::fairing::AdHoc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{config::Config, i18n::Locale, registration::Registration};

/// Placeholder the processor replaces with the session id in the success URL.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Longest participant listing that is attached to a session as is.
const MAX_PARTICIPANTS_METADATA: usize = 500;

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("HTTP error while talking to the payment processor: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Checkout session {0} came without a redirect URL")]
    MissingUrl(String),
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),
}

/// Everything the processor needs to know to open a checkout for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub events: Vec<String>,
    pub notes: String,
    /// JSON listing of the additional participants.
    pub participants: String,
    pub participant_count: usize,
    /// Total in whole currency units.
    pub amount: u32,
    pub locale: Locale,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    #[must_use]
    pub fn new(registration: &Registration, locale: Locale, base_url: &str) -> Self {
        let representative = &registration.representative;
        let base_url = base_url.trim_end_matches('/');
        let lang = locale.as_str();

        Self {
            name: representative.person.name.clone(),
            email: representative.email.to_string(),
            phone: representative.phone.clone().unwrap_or_default(),
            gender: representative.person.gender.as_str().to_string(),
            events: representative
                .person
                .events
                .iter()
                .map(|activity| activity.tag().to_string())
                .collect(),
            notes: representative.notes.clone().unwrap_or_default(),
            participants: serde_json::to_string(&registration.participants)
                .unwrap_or_else(|_| "[]".to_string()),
            participant_count: registration.headcount(),
            amount: registration.total_fee(),
            locale,
            success_url: format!(
                "{base_url}/{lang}/payment-success?session_id={SESSION_ID_PLACEHOLDER}"
            ),
            cancel_url: format!("{base_url}/{lang}/payment-cancel"),
        }
    }

    /// Key/value pairs attached to the session for later reference in the processor's dashboard.
    #[must_use]
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        let participants = if self.participants.chars().count() > MAX_PARTICIPANTS_METADATA {
            "participant details omitted, too long".to_string()
        } else {
            self.participants.clone()
        };

        vec![
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("phone", self.phone.clone()),
            ("gender", self.gender.clone()),
            ("events", self.events.join(", ")),
            ("notes", self.notes.clone()),
            ("participantsCount", self.participant_count.to_string()),
            ("participants", participants),
            ("language", self.locale.as_str().to_string()),
        ]
    }
}

/// An opened checkout the user is redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    Other(String),
}

impl PaymentStatus {
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "paid" => Self::Paid,
            "unpaid" => Self::Unpaid,
            "no_payment_required" => Self::NoPaymentRequired,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::NoPaymentRequired => "no_payment_required",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A payment processor offering hosted checkout pages.
#[rocket::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor couldn't be reached or refused the session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError>;

    /// Asks the processor whether the session was paid.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor couldn't be reached or doesn't know the session.
    async fn payment_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentGatewayError>;
}

/// The gateway as kept in Rocket's managed state.
pub type SharedGateway = Arc<dyn PaymentGateway>;

/// Stripe Checkout through its REST API.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    currency: String,
    product_name: String,
    api_base: String,
}

impl StripeGateway {
    pub const API_BASE: &'static str = "https://api.stripe.com/v1";

    #[must_use]
    pub fn new(secret_key: String, currency: String, product_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            currency,
            product_name,
            api_base: Self::API_BASE.to_string(),
        }
    }

    /// `{api_base}/checkout/sessions`, followed by the percent-encoded session id if given.
    fn sessions_url(&self, session_id: Option<&str>) -> Result<reqwest::Url, PaymentGatewayError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|err| PaymentGatewayError::Unavailable(format!("invalid API base: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| PaymentGatewayError::Unavailable("API base can't carry a path".into()))?
            .pop_if_empty()
            .extend(["checkout", "sessions"].into_iter().chain(session_id));
        Ok(url)
    }

    /// The form body of a session creation request.
    fn session_form(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = [
            ("payment_method_types[0]", "card".to_string()),
            ("mode", "payment".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            // amounts are sent in the smallest unit of a two-decimal currency
            (
                "line_items[0][price_data][unit_amount]",
                (u64::from(request.amount) * 100).to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                self.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                format!(
                    "{} participant(s) including {}",
                    request.participant_count, request.name
                ),
            ),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("customer_email", request.email.clone()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        form.extend(
            request
                .metadata()
                .into_iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value)),
        );
        form
    }
}

impl fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeGateway")
            .field("currency", &self.currency)
            .field("product_name", &self.product_name)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PaymentGatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = response
        .json::<StripeErrorBody>()
        .await
        .map_or_else(|_| status.to_string(), |body| body.error.message);
    Err(PaymentGatewayError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[rocket::async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let response = self
            .client
            .post(self.sessions_url(None)?)
            .bearer_auth(&self.secret_key)
            .form(&self.session_form(request))
            .send()
            .await?;
        let session: StripeSession = parse_response(response).await?;

        match session.url {
            Some(url) => Ok(CheckoutSession {
                id: session.id,
                url,
            }),
            None => Err(PaymentGatewayError::MissingUrl(session.id)),
        }
    }

    async fn payment_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentGatewayError> {
        let response = self
            .client
            .get(self.sessions_url(Some(session_id))?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let session: StripeSession = parse_response(response).await?;

        Ok(session
            .payment_status
            .as_deref()
            .map_or(PaymentStatus::Unpaid, PaymentStatus::parse))
    }
}

/// An in-process gateway for development and tests. Its "checkout" sends the user straight to the
/// success page.
#[derive(Debug)]
pub struct MockPaymentGateway {
    calls: AtomicUsize,
    failing: AtomicBool,
    status: PaymentStatus,
}

impl MockPaymentGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::with_status(PaymentStatus::Paid)
    }

    /// A gateway reporting `status` for every session.
    #[must_use]
    pub fn with_status(status: PaymentStatus) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            status,
        }
    }

    /// How many checkout sessions were requested so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), PaymentGatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PaymentGatewayError::Unavailable(
                "mock gateway is set to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_available()?;

        let id = format!("mock_{call}");
        log::info!(
            "Mock checkout session {id} for {} over {}",
            request.email,
            request.amount
        );
        Ok(CheckoutSession {
            url: request.success_url.replace(SESSION_ID_PLACEHOLDER, &id),
            id,
        })
    }

    async fn payment_status(
        &self,
        _session_id: &str,
    ) -> Result<PaymentStatus, PaymentGatewayError> {
        self.check_available()?;
        Ok(self.status.clone())
    }
}

/// Puts a [`SharedGateway`] into managed state unless one is already there: Stripe if a secret
/// key is configured, the mock otherwise.
#[must_use]
pub fn fairing() -> AdHoc {
    AdHoc::on_ignite("Payment gateway", |rocket| async move {
        if rocket.state::<SharedGateway>().is_some() {
            return rocket;
        }

        let gateway: SharedGateway = match rocket.state::<Config>() {
            Some(Config {
                stripe_secret_key: Some(key),
                currency,
                event_name,
                ..
            }) => {
                log::info!("Using Stripe checkout in {currency}");
                Arc::new(StripeGateway::new(
                    key.clone(),
                    currency.clone(),
                    event_name.clone(),
                ))
            }
            _ => {
                log::warn!("No Stripe secret key configured, payments go to the mock gateway");
                Arc::new(MockPaymentGateway::new())
            }
        };
        rocket.manage(gateway)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        participant::{ParticipantInput, RepresentativeInput},
        track::{Track, TrackRules},
    };

    fn registration(participants: usize) -> Registration {
        let kid = ParticipantInput {
            name: "子ども".to_string(),
            age: "9".to_string(),
            gender: "female".to_string(),
            events: vec!["relay".to_string()],
        };
        Registration::build(
            &RepresentativeInput {
                person: ParticipantInput {
                    name: "Taro".to_string(),
                    age: "38".to_string(),
                    gender: "male".to_string(),
                    events: vec!["running".to_string(), "dance".to_string()],
                },
                email: "taro@example.org".to_string(),
                phone: String::new(),
                notes: "vegetarian".to_string(),
            },
            &vec![kid; participants],
            Track::Open,
            &TrackRules::default(),
        )
        .unwrap()
    }

    #[test]
    fn request_carries_urls_and_totals() {
        let request = CheckoutRequest::new(&registration(2), Locale::Ja, "https://fest.example/");

        assert_eq!(request.amount, 20);
        assert_eq!(request.participant_count, 3);
        assert_eq!(
            request.success_url,
            "https://fest.example/ja/payment-success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(request.cancel_url, "https://fest.example/ja/payment-cancel");
        assert_eq!(request.events, vec!["running", "dance"]);
    }

    #[test]
    fn long_participant_listings_are_left_out_of_metadata() {
        let request = CheckoutRequest::new(&registration(20), Locale::En, "http://localhost");
        let metadata = request.metadata();
        let participants = metadata
            .iter()
            .find(|(key, _)| *key == "participants")
            .unwrap();
        assert_eq!(participants.1, "participant details omitted, too long");

        let request = CheckoutRequest::new(&registration(1), Locale::En, "http://localhost");
        let metadata = request.metadata();
        let participants = metadata
            .iter()
            .find(|(key, _)| *key == "participants")
            .unwrap();
        assert!(participants.1.starts_with('['));
    }

    #[test]
    fn stripe_form_converts_to_cents() {
        let gateway = StripeGateway::new(
            "sk_test".to_string(),
            "usd".to_string(),
            "Entry fee".to_string(),
        );
        let form = gateway.session_form(&CheckoutRequest::new(
            &registration(0),
            Locale::En,
            "http://localhost",
        ));
        let value = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };

        assert_eq!(value("line_items[0][price_data][unit_amount]"), "2000");
        assert_eq!(value("metadata[language]"), "en");
        assert_eq!(value("customer_email"), "taro@example.org");
    }

    #[test]
    fn session_ids_stay_inside_their_path_segment() {
        let gateway = StripeGateway::new(
            "sk_test".to_string(),
            "usd".to_string(),
            "Entry fee".to_string(),
        );

        assert_eq!(
            gateway.sessions_url(None).unwrap().as_str(),
            "https://api.stripe.com/v1/checkout/sessions"
        );
        assert_eq!(
            gateway.sessions_url(Some("../customers?limit=1")).unwrap().path(),
            "/v1/checkout/sessions/..%2Fcustomers%3Flimit=1"
        );
    }

    #[rocket::async_test]
    async fn mock_redirects_to_the_success_page() {
        let gateway = MockPaymentGateway::new();
        let request = CheckoutRequest::new(&registration(0), Locale::En, "http://localhost");

        let session = gateway.create_checkout_session(&request).await.unwrap();
        assert_eq!(session.id, "mock_1");
        assert_eq!(
            session.url,
            "http://localhost/en/payment-success?session_id=mock_1"
        );
        assert_eq!(
            gateway.payment_status(&session.id).await.unwrap(),
            PaymentStatus::Paid
        );

        gateway.set_failing(true);
        assert!(gateway.create_checkout_session(&request).await.is_err());
        assert_eq!(gateway.calls(), 2);
    }

    #[test]
    fn unknown_statuses_are_kept() {
        assert_eq!(PaymentStatus::parse("paid"), PaymentStatus::Paid);
        assert_eq!(
            PaymentStatus::parse("open").to_string(),
            "open".to_string()
        );
    }
}
