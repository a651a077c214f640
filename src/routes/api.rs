use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Route, State,
};

use crate::{
    config::Config,
    payment::SharedGateway,
    routes::payment::{refresh_payment_status, StatusRefreshError},
    sheet, RegistrationsDBConn,
};

#[must_use]
pub fn routes() -> Vec<Route> {
    routes![update_payment_status, current_participants]
}

#[get("/api/update-payment-status?<session_id>")]
pub async fn update_payment_status(
    session_id: Option<String>,
    conn: RegistrationsDBConn,
    gateway: &State<SharedGateway>,
    config: &State<Config>,
) -> (Status, Json<Value>) {
    let Some(session_id) = session_id.filter(|id| !id.trim().is_empty()) else {
        return (
            Status::BadRequest,
            Json(json!({ "error": "Session ID is required" })),
        );
    };

    match refresh_payment_status(&conn, gateway.inner().as_ref(), config, &session_id).await {
        Ok(status) => (
            Status::Ok,
            Json(json!({ "success": true, "status": status })),
        ),
        Err(err @ StatusRefreshError::UnknownSession(_)) => {
            log::warn!("{err}");
            (Status::NotFound, Json(json!({ "error": err.to_string() })))
        }
        Err(err) => {
            log::error!("Couldn't update payment status of session {session_id}: {err}");
            (
                Status::InternalServerError,
                Json(json!({ "error": "Failed to update payment status" })),
            )
        }
    }
}

#[get("/api/current-participants")]
pub async fn current_participants(conn: RegistrationsDBConn) -> (Status, Json<Value>) {
    match conn.run(|c| sheet::current_participants(c)).await {
        Ok(count) => (Status::Ok, Json(json!({ "count": count }))),
        Err(err) => {
            log::error!("Couldn't count participants: {err}");
            (
                Status::InternalServerError,
                Json(json!({ "error": "Failed to fetch participant count" })),
            )
        }
    }
}
