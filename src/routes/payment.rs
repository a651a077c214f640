use rocket::{Route, State};
use rocket_dyn_templates::{context, Template};
use thiserror::Error;

use crate::{
    config::Config,
    i18n::Locale,
    mail,
    payment::{PaymentGateway, PaymentGatewayError, PaymentStatus, SharedGateway},
    routes::Layout,
    sheet::{self, SheetRow},
    RegistrationsDBConn,
};

#[must_use]
pub fn routes() -> Vec<Route> {
    routes![payment_success, payment_cancel, waiting_list_confirmation]
}

#[derive(Debug, Error)]
pub enum StatusRefreshError {
    #[error("Payment processor error: {0}")]
    Gateway(#[from] PaymentGatewayError),
    #[error("Database or query error: {0}")]
    RusqliteError(#[from] rocket_sync_db_pools::rusqlite::Error),
    #[error("No registration belongs to checkout session {0}")]
    UnknownSession(String),
}

/// Asks the processor for the payment status of a session and writes it into the sheet. Sends
/// the confirmation mail once a session turns paid, if mail is configured.
///
/// Sessions without a sheet row are rejected before the processor is asked.
pub async fn refresh_payment_status(
    conn: &RegistrationsDBConn,
    gateway: &dyn PaymentGateway,
    config: &Config,
    session_id: &str,
) -> Result<PaymentStatus, StatusRefreshError> {
    let id = session_id.to_string();
    let Some(previous) = conn.run(move |c| sheet::find_row_by_session(c, &id)).await? else {
        return Err(StatusRefreshError::UnknownSession(session_id.to_string()));
    };

    let status = gateway.payment_status(session_id).await?;

    let (id, status_text) = (session_id.to_string(), status.to_string());
    conn.run(move |c| sheet::update_payment_status(c, &id, &status_text))
        .await?;
    log::info!("Payment status of session {session_id} is now '{status}'");

    if status == PaymentStatus::Paid && previous.payment_status != status.as_str() {
        if let Some(mail_config) = &config.mail {
            let row = SheetRow {
                payment_status: status.to_string(),
                ..previous
            };
            if let Err(err) =
                mail::send_confirmation_mail(&row, mail_config, &config.event_name).await
            {
                log::error!("Couldn't send confirmation mail to {}: {err}", row.email);
            }
        }
    }

    Ok(status)
}

#[get("/<lang>/payment-success?<session_id>")]
pub async fn payment_success(
    lang: Locale,
    session_id: Option<String>,
    conn: RegistrationsDBConn,
    gateway: &State<SharedGateway>,
    config: &State<Config>,
) -> Template {
    let mut status_failed = false;
    if let Some(session_id) = &session_id {
        if let Err(err) =
            refresh_payment_status(&conn, gateway.inner().as_ref(), config, session_id).await
        {
            // handled manually by the organizers, never retried
            log::error!("Couldn't update payment status of session {session_id}: {err}");
            status_failed = true;
        }
    }

    Template::render(
        "payment-success",
        context! {
            layout: Layout::new(lang),
            session_id,
            status_failed,
        },
    )
}

#[get("/<lang>/payment-cancel")]
pub fn payment_cancel(lang: Locale) -> Template {
    Template::render(
        "payment-cancel",
        context! {
            layout: Layout::new(lang),
        },
    )
}

#[get("/<lang>/waiting-list-confirmation")]
pub fn waiting_list_confirmation(lang: Locale) -> Template {
    Template::render(
        "waiting-list-confirmation",
        context! {
            layout: Layout::new(lang),
        },
    )
}
