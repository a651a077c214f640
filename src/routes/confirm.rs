use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rocket::{form::Form, response::Redirect, Route, State};
use rocket_dyn_templates::{context, Template};

use crate::{
    config::Config,
    i18n::{self, Locale},
    payment::SharedGateway,
    routes::{field_messages, payment as payment_routes, Layout},
    sheet::{self, SheetRow},
    submissions::DuplicateGuard,
    transport::WizardParams,
    wizard::{
        self, CheckoutContext, CheckoutOutcome, ConfirmView, Review, WizardStep, SIGNATURE_FIELD,
    },
    RegistrationsDBConn,
};

/// Hidden form field the duplicate warning submits along with the registration.
pub const DUPLICATE_ACKNOWLEDGED_FIELD: &str = "duplicate_acknowledged";

#[must_use]
pub fn routes() -> Vec<Route> {
    routes![confirm_page, checkout]
}

/// Things that can happen on the confirm page besides showing it.
#[derive(Debug, Default)]
struct Notice {
    duplicate_of: Option<DateTime<Utc>>,
    checkout_failed: bool,
}

fn render(lang: Locale, params: &WizardParams, review: &Review, notice: &Notice) -> Template {
    let (view, errors) = match review {
        Review::Valid(registration) => (Some(ConfirmView::new(registration, lang)), None),
        Review::Invalid { errors, .. } => (None, Some(errors)),
    };
    // a registration that is only missing its signature goes back to the disclaimer
    let edit_step = match errors {
        Some(errors) if errors.len() == 1 && errors.get(SIGNATURE_FIELD).is_some() => {
            WizardStep::Disclaimer
        }
        _ => WizardStep::Register,
    };

    Template::render(
        "confirm",
        context! {
            layout: Layout::new(lang),
            params,
            view,
            carried_data_broken: errors.is_some(),
            errors: field_messages(errors, lang),
            edit_location: edit_step.location(lang, params),
            duplicate_warning: notice.duplicate_of.is_some(),
            duplicate_of: notice
                .duplicate_of
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string()),
            duplicate_field: DUPLICATE_ACKNOWLEDGED_FIELD,
            checkout_error: notice
                .checkout_failed
                .then(|| i18n::lookup(lang, "errors.checkout")),
        },
    )
}

#[get("/<lang>/confirm?<params..>")]
pub fn confirm_page(
    lang: Locale,
    config: &State<Config>,
    params: HashMap<String, String>,
) -> Template {
    let params = WizardParams::from(params);
    let review = wizard::review_signed(&params, &config.track_rules());
    render(lang, &params, &review, &Notice::default())
}

#[post("/<lang>/checkout", data = "<form>")]
pub async fn checkout(
    lang: Locale,
    conn: RegistrationsDBConn,
    config: &State<Config>,
    gateway: &State<SharedGateway>,
    guard: &State<DuplicateGuard>,
    form: Form<HashMap<String, String>>,
) -> Result<Redirect, Template> {
    let mut params = WizardParams::from(form.into_inner());
    let duplicate_acknowledged = params.remove(DUPLICATE_ACKNOWLEDGED_FIELD).is_some();

    let registration = match wizard::review_signed(&params, &config.track_rules()) {
        Review::Valid(registration) => registration,
        invalid @ Review::Invalid { .. } => {
            return Err(render(lang, &params, &invalid, &Notice::default()))
        }
    };

    let context = CheckoutContext {
        gateway: gateway.inner().as_ref(),
        guard: guard.inner(),
        base_url: &config.base_url,
    };
    let now = Utc::now();
    let outcome =
        match wizard::checkout(&registration, lang, duplicate_acknowledged, &context, now).await {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!(
                    "Couldn't create checkout session for {}: {err}",
                    registration.representative.email
                );
                let notice = Notice {
                    checkout_failed: true,
                    ..Notice::default()
                };
                return Err(render(lang, &params, &Review::Valid(registration), &notice));
            }
        };

    if let CheckoutOutcome::DuplicateWarning { last_submitted } = outcome {
        let notice = Notice {
            duplicate_of: Some(last_submitted),
            ..Notice::default()
        };
        return Err(render(lang, &params, &Review::Valid(registration), &notice));
    }

    // failing to record the registration doesn't stop the checkout
    if let Some((status, session_id)) = outcome.row_status() {
        let row = SheetRow::from_registration(&registration, status, session_id, lang, now);
        match conn.run(move |c| sheet::append_row(c, &row)).await {
            Ok(()) => log::info!(
                "Recorded registration of {} with status '{status}'",
                registration.representative.email
            ),
            Err(err) => log::error!(
                "Couldn't record registration of {}: {err}",
                registration.representative.email
            ),
        }
    }

    Ok(match outcome {
        CheckoutOutcome::Redirect(session) => Redirect::to(session.url),
        CheckoutOutcome::WaitingList => {
            Redirect::to(uri!(payment_routes::waiting_list_confirmation(lang)))
        }
        CheckoutOutcome::NoPaymentRequired | CheckoutOutcome::DuplicateWarning { .. } => {
            Redirect::to(uri!(payment_routes::payment_success(lang, _)))
        }
    })
}
