//! The registration wizard: Register → Disclaimer → Confirm → Checkout-handoff.
//!
//! Every page receives the registration as [`WizardParams`], re-validates it and hands it on in
//! the same form. Nothing is kept on the server between pages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    i18n::Locale,
    participant::Participant,
    payment::{CheckoutRequest, CheckoutSession, PaymentGateway, PaymentGatewayError},
    registration::{Registration, RegistrationDraft},
    sheet::{STATUS_NO_PAYMENT_REQUIRED, STATUS_PENDING, STATUS_WAITING_LIST},
    submissions::{DuplicateGuard, Fingerprint},
    track::{Track, TrackRules},
    transport::WizardParams,
    validation::{ValidationErrors, Violation},
};

/// Form field paths of the disclaimer page.
pub const AGREEMENT_FIELD: &str = "agreement";
pub const SIGNATURE_FIELD: &str = "signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Register,
    Disclaimer,
    Confirm,
    CheckoutHandoff,
}

impl WizardStep {
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Register => Some(Self::Disclaimer),
            Self::Disclaimer => Some(Self::Confirm),
            Self::Confirm => Some(Self::CheckoutHandoff),
            Self::CheckoutHandoff => None,
        }
    }

    #[must_use]
    pub const fn back(self) -> Option<Self> {
        match self {
            Self::Register | Self::CheckoutHandoff => None,
            Self::Disclaimer => Some(Self::Register),
            Self::Confirm => Some(Self::Disclaimer),
        }
    }

    /// Name of the template rendering this step.
    #[must_use]
    pub const fn page(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Disclaimer => "disclaimer",
            Self::Confirm | Self::CheckoutHandoff => "confirm",
        }
    }

    /// Where this step lives for `locale`, carrying `params` along.
    #[must_use]
    pub fn location(self, locale: Locale, params: &WizardParams) -> String {
        let lang = locale.as_str();
        match self {
            Self::Register => format!("/{lang}/register?{}", params.to_query()),
            Self::Disclaimer => format!("/{lang}/disclaimer?{}", params.to_query()),
            Self::Confirm => format!("/{lang}/confirm?{}", params.to_query()),
            Self::CheckoutHandoff => format!("/{lang}/checkout"),
        }
    }
}

/// Validates what was entered on the register page and flattens it for the disclaimer.
///
/// # Errors
///
/// Returns every invalid field of the representative and all participants.
pub fn submit_register(
    draft: &RegistrationDraft,
    rules: &TrackRules,
) -> Result<WizardParams, ValidationErrors> {
    Ok(draft.validate(rules)?.to_params())
}

/// What the disclaimer page asks for on top of the carried registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consent {
    pub agreed: bool,
    pub signature: String,
}

/// Checks the consent and re-validates the carried registration, then adds the signature to it.
///
/// # Errors
///
/// Returns the missing consent fields together with anything wrong in the carried data.
pub fn submit_disclaimer(
    params: &WizardParams,
    consent: &Consent,
    rules: &TrackRules,
) -> Result<WizardParams, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if !consent.agreed {
        errors.push(AGREEMENT_FIELD, Violation::AgreementRequired);
    }
    if consent.signature.trim().is_empty() {
        errors.push(SIGNATURE_FIELD, Violation::SignatureRequired);
    }

    match RegistrationDraft::from_params(params).validate(rules) {
        Ok(registration) => errors.into_result(|| {
            registration
                .with_signature(&consent.signature)
                .to_params()
        }),
        Err(carried) => {
            errors.extend(carried);
            Err(errors)
        }
    }
}

/// A carried registration as found on arrival at a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Valid(Registration),
    /// The carried data didn't validate. The draft holds whatever could be recovered from it.
    Invalid {
        draft: RegistrationDraft,
        errors: ValidationErrors,
    },
}

/// Re-hydrates the carried registration.
#[must_use]
pub fn review(params: &WizardParams, rules: &TrackRules) -> Review {
    let draft = RegistrationDraft::from_params(params);
    match draft.validate(rules) {
        Ok(registration) => Review::Valid(registration),
        Err(errors) => {
            log::warn!("Carried registration didn't validate: {errors}");
            Review::Invalid { draft, errors }
        }
    }
}

/// Like [`review`], for the pages past the disclaimer, where a registration without signature
/// doesn't count as valid.
#[must_use]
pub fn review_signed(params: &WizardParams, rules: &TrackRules) -> Review {
    match review(params, rules) {
        Review::Valid(registration) if registration.representative.signature.is_none() => {
            log::warn!(
                "Carried registration of {} skipped the disclaimer",
                registration.representative.email
            );
            let mut errors = ValidationErrors::new();
            errors.push(SIGNATURE_FIELD, Violation::SignatureRequired);
            Review::Invalid {
                draft: RegistrationDraft::from_params(params),
                errors,
            }
        }
        review => review,
    }
}

/// One line of the confirm page's member listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberLine {
    /// 1 for the representative, then in entry order.
    pub number: usize,
    pub is_representative: bool,
    pub name: String,
    pub age: u8,
    pub gender: &'static str,
    pub events: Vec<&'static str>,
    pub fee: u32,
}

impl MemberLine {
    fn new(number: usize, participant: &Participant, locale: Locale) -> Self {
        Self {
            number,
            is_representative: number == 1,
            name: participant.name.clone(),
            age: participant.age,
            gender: participant.gender.label(locale),
            events: participant
                .events
                .iter()
                .map(|activity| activity.label(locale))
                .collect(),
            fee: participant.fee(),
        }
    }
}

/// Everything the confirm page shows, derived from the registration without touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmView {
    pub track: Track,
    pub is_waiting_list: bool,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub signature: Option<String>,
    pub members: Vec<MemberLine>,
    pub free_count: usize,
    pub paid_count: usize,
    pub total: u32,
}

impl ConfirmView {
    #[must_use]
    pub fn new(registration: &Registration, locale: Locale) -> Self {
        let representative = &registration.representative;
        let (free_count, paid_count) = registration.bracket_counts();

        Self {
            track: registration.track,
            is_waiting_list: registration.track == Track::WaitingList,
            email: representative.email.to_string(),
            phone: representative.phone.clone(),
            notes: representative.notes.clone(),
            signature: representative.signature.clone(),
            members: registration
                .members()
                .enumerate()
                .map(|(i, member)| MemberLine::new(i + 1, member, locale))
                .collect(),
            free_count,
            paid_count,
            total: registration.total_fee(),
        }
    }
}

/// What became of a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Send the user to the processor's checkout page.
    Redirect(CheckoutSession),
    /// Nothing to pay, the registration is complete.
    NoPaymentRequired,
    /// Waiting list registrations aren't paid for.
    WaitingList,
    /// The same person checked out recently. Nothing happened, the user has to acknowledge this
    /// before trying again.
    DuplicateWarning { last_submitted: DateTime<Utc> },
}

impl CheckoutOutcome {
    /// Status and session id of the sheet row to append, if one is due.
    #[must_use]
    pub fn row_status(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::Redirect(session) => Some((STATUS_PENDING, Some(session.id.as_str()))),
            Self::NoPaymentRequired => Some((STATUS_NO_PAYMENT_REQUIRED, None)),
            Self::WaitingList => Some((STATUS_WAITING_LIST, None)),
            Self::DuplicateWarning { .. } => None,
        }
    }
}

/// The collaborators a checkout needs.
pub struct CheckoutContext<'a> {
    pub gateway: &'a dyn PaymentGateway,
    pub guard: &'a DuplicateGuard,
    /// Public URL of this server, for the processor to redirect back to.
    pub base_url: &'a str,
}

/// Hands the registration over to the payment processor. At most one checkout session is
/// requested per call, none for the waiting list, free registrations and unacknowledged
/// duplicates.
///
/// # Errors
///
/// Returns the gateway's error if the session couldn't be created. The submission is forgotten
/// then, so retrying isn't flagged as duplicate.
pub async fn checkout(
    registration: &Registration,
    locale: Locale,
    duplicate_acknowledged: bool,
    context: &CheckoutContext<'_>,
    now: DateTime<Utc>,
) -> Result<CheckoutOutcome, PaymentGatewayError> {
    if registration.track == Track::WaitingList {
        return Ok(CheckoutOutcome::WaitingList);
    }
    if registration.total_fee() == 0 {
        return Ok(CheckoutOutcome::NoPaymentRequired);
    }

    let representative = &registration.representative;
    let fingerprint = Fingerprint::of(
        &representative.email.to_string(),
        &representative.person.name,
    );
    if duplicate_acknowledged {
        context.guard.record(fingerprint.clone(), now);
    } else if let Some(last_submitted) = context.guard.check_and_record(fingerprint.clone(), now)
    {
        log::warn!(
            "Possible duplicate checkout for {}, last one at {last_submitted}",
            representative.email
        );
        return Ok(CheckoutOutcome::DuplicateWarning { last_submitted });
    }

    let request = CheckoutRequest::new(registration, locale, context.base_url);
    match context.gateway.create_checkout_session(&request).await {
        Ok(session) => {
            log::info!(
                "Created checkout session {} for {} over {}",
                session.id,
                representative.email,
                request.amount
            );
            Ok(CheckoutOutcome::Redirect(session))
        }
        Err(err) => {
            context.guard.release(&fingerprint);
            Err(err)
        }
    }
}
