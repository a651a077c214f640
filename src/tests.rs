use std::sync::Arc;

use rocket::{
    http::{ContentType, Status, StatusClass},
    local::blocking::{Client, LocalResponse},
    serde::json::Value,
};

use crate::payment::{MockPaymentGateway, SharedGateway};

const FAMILY: &str = "track=open&name=Taro&age=35&email=taro%40example.com&gender=male\
    &events=running&events=relay\
    &participants[0].name=Hana&participants[0].age=8&participants[0].gender=female\
    &participants[0].events=tailtag";

/// A client on a fresh in-memory sheet, with checkouts going to `gateway`.
fn client(gateway: &Arc<MockPaymentGateway>) -> Client {
    let figment = rocket::Config::figment()
        .merge(("databases.registrations.url", ":memory:"))
        .merge(("databases.registrations.pool_size", 1));
    let shared: SharedGateway = gateway.clone();
    Client::tracked(crate::build(figment).manage(shared)).unwrap()
}

fn location(response: &LocalResponse<'_>) -> String {
    response
        .headers()
        .get_one("Location")
        .unwrap_or_default()
        .to_string()
}

fn query(location: &str) -> &str {
    location.split_once('?').map_or("", |(_, query)| query)
}

fn post_form<'c>(client: &'c Client, path: &'static str, body: &str) -> LocalResponse<'c> {
    client
        .post(path)
        .header(ContentType::Form)
        .body(body)
        .dispatch()
}

/// Walks register and disclaimer, returning the confirm page location.
fn reach_confirm(client: &Client, lang: &'static str, registration: &str) -> String {
    let (register, disclaimer) = match lang {
        "ja" => ("/ja/register", "/ja/disclaimer"),
        _ => ("/en/register", "/en/disclaimer"),
    };

    let response = post_form(client, register, registration);
    assert_eq!(response.status(), Status::SeeOther);
    let to_disclaimer = location(&response);
    assert!(to_disclaimer.starts_with(&format!("/{lang}/disclaimer?")));

    let page = client.get(to_disclaimer.clone()).dispatch();
    assert_eq!(page.status(), Status::Ok);
    assert!(!page.into_string().unwrap().contains("carried-data-error"));

    let signed = format!("{}&agreement=yes&signature=Taro", query(&to_disclaimer));
    let response = post_form(client, disclaimer, &signed);
    assert_eq!(response.status(), Status::SeeOther);
    let to_confirm = location(&response);
    assert!(to_confirm.starts_with(&format!("/{lang}/confirm?")));
    to_confirm
}

fn json(response: LocalResponse<'_>) -> Value {
    response.into_json().unwrap()
}

#[test]
fn root_redirects_to_fallback_language() {
    let client = client(&Arc::new(MockPaymentGateway::new()));

    let response = client.get("/").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), "/en");

    let landing = client.get("/ja").dispatch();
    assert_eq!(landing.status(), Status::Ok);
    assert!(landing.into_string().unwrap().contains(r#"<html lang="ja">"#));
}

#[test]
fn unknown_languages_are_not_served() {
    let client = client(&Arc::new(MockPaymentGateway::new()));

    for path in ["/fr", "/fr/register", "/de/confirm?name=Taro"] {
        let response = client.get(path).dispatch();
        assert_eq!(response.status().class(), StatusClass::ClientError, "{path}");
    }
}

#[test]
fn full_wizard_ends_at_the_processor() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);

    let to_confirm = reach_confirm(&client, "en", FAMILY);
    let page = client.get(to_confirm.clone()).dispatch();
    assert_eq!(page.status(), Status::Ok);
    let page = page.into_string().unwrap();
    assert!(page.contains(r#"id="total""#));
    assert!(page.contains("Hana"));
    assert!(!page.contains("carried-data-error"));

    let response = post_form(&client, "/en/checkout", query(&to_confirm));
    assert_eq!(response.status(), Status::SeeOther);
    assert!(location(&response).ends_with("/en/payment-success?session_id=mock_1"));
    assert_eq!(gateway.calls(), 1);

    let success = client.get("/en/payment-success?session_id=mock_1").dispatch();
    assert_eq!(success.status(), Status::Ok);
    let success = success.into_string().unwrap();
    assert!(success.contains("mock_1"));
    assert!(!success.contains("status-failed"));

    let status = json(client.get("/api/update-payment-status?session_id=mock_1").dispatch());
    assert_eq!(status["success"], true);
    assert_eq!(status["status"], "paid");

    let count = json(client.get("/api/current-participants").dispatch());
    assert_eq!(count["count"], 2);
}

#[test]
fn duplicate_checkout_needs_acknowledgement() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);
    let to_confirm = reach_confirm(&client, "en", FAMILY);
    let carried = query(&to_confirm).to_string();

    let first = post_form(&client, "/en/checkout", &carried);
    assert_eq!(first.status(), Status::SeeOther);

    let second = post_form(&client, "/en/checkout", &carried);
    assert_eq!(second.status(), Status::Ok);
    let warning = second.into_string().unwrap();
    assert!(warning.contains("duplicate-warning"));
    // the acknowledgement travels in a field, not in the button pressed
    assert!(warning.contains(r#"<input type="hidden" name="duplicate_acknowledged" value="yes">"#));
    assert_eq!(gateway.calls(), 1);

    let acknowledged = format!("{carried}&duplicate_acknowledged=yes");
    let third = post_form(&client, "/en/checkout", &acknowledged);
    assert_eq!(third.status(), Status::SeeOther);
    assert!(location(&third).ends_with("session_id=mock_2"));
    assert_eq!(gateway.calls(), 2);
}

#[test]
fn malformed_carried_data_shows_an_error() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);
    let broken = "track=open&name=Taro&age=abc&participants=%7Bnot%20json";

    for page in ["/en/disclaimer", "/en/confirm", "/ja/confirm"] {
        let response = client.get(format!("{page}?{broken}")).dispatch();
        assert_eq!(response.status(), Status::Ok, "{page}");
        assert!(response.into_string().unwrap().contains("carried-data-error"));
    }

    let response = post_form(&client, "/en/checkout", broken);
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("carried-data-error"));
    assert_eq!(gateway.calls(), 0);
}

#[test]
fn unsigned_registrations_are_not_checked_out() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);
    let to_confirm = reach_confirm(&client, "en", FAMILY);
    let unsigned = query(&to_confirm).replace("signature=Taro", "signature=");

    let page = client.get(format!("/en/confirm?{unsigned}")).dispatch();
    assert_eq!(page.status(), Status::Ok);
    assert!(page.into_string().unwrap().contains("carried-data-error"));

    let response = post_form(&client, "/en/checkout", &unsigned);
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("carried-data-error"));
    assert_eq!(gateway.calls(), 0);
}

#[test]
fn invalid_register_form_is_shown_again() {
    let client = client(&Arc::new(MockPaymentGateway::new()));

    let response = post_form(&client, "/en/register", "track=open&name=&age=35&email=nope");
    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("form-errors"));
    assert!(page.contains("field-error"));
}

#[test]
fn enter_in_a_field_continues_to_the_disclaimer() {
    let client = client(&Arc::new(MockPaymentGateway::new()));

    let page = client.get("/en/register?track=open").dispatch().into_string().unwrap();
    let default_submit = page.find(r#"id="default-submit""#).unwrap();
    let add = page.find(r#"name="add_participant""#).unwrap();
    assert!(default_submit < add);

    let with_participant = client
        .get(format!("/en/register?{}", query(&reach_confirm(&client, "en", FAMILY))))
        .dispatch()
        .into_string()
        .unwrap();
    let default_submit = with_participant.find(r#"id="default-submit""#).unwrap();
    let remove = with_participant.find(r#"name="remove_participant""#).unwrap();
    assert!(default_submit < remove);

    // the default button carries no name, so the form arrives without either action
    let response = post_form(&client, "/en/register", FAMILY);
    assert_eq!(response.status(), Status::SeeOther);
    assert!(location(&response).starts_with("/en/disclaimer?"));
}

#[test]
fn survey_is_only_asked_on_the_waiting_list() {
    let client = client(&Arc::new(MockPaymentGateway::new()));

    let open = client.get("/en/register?track=open").dispatch().into_string().unwrap();
    assert!(!open.contains(r#"name="club_experience""#));
    assert!(!open.contains(r#"name="exercise_frequency""#));

    let waiting = client
        .get("/ja/register?track=waiting-list")
        .dispatch()
        .into_string()
        .unwrap();
    assert!(waiting.contains(r#"name="club_experience""#));
    assert!(waiting.contains(r#"name="exercise_frequency""#));
}

#[test]
fn participants_are_added_and_removed_in_place() {
    let client = client(&Arc::new(MockPaymentGateway::new()));

    let added = post_form(&client, "/en/register", &format!("{FAMILY}&add_participant=yes"));
    assert_eq!(added.status(), Status::Ok);
    let page = added.into_string().unwrap();
    assert!(page.contains(r#"id="participant-0""#));
    assert!(page.contains(r#"id="participant-1""#));
    assert!(!page.contains("field-error"));

    let removed = post_form(&client, "/en/register", &format!("{FAMILY}&remove_participant=0"));
    assert_eq!(removed.status(), Status::Ok);
    assert!(!removed.into_string().unwrap().contains(r#"id="participant-0""#));
}

#[test]
fn waiting_list_skips_payment() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);

    let too_young = "track=waiting-list&name=Ken&age=20&email=ken%40example.com&gender=male\
        &events=dance";
    let response = post_form(&client, "/ja/register", too_young);
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("field-error"));

    let old_enough = too_young.replace("age=20", "age=30");
    let to_confirm = reach_confirm(&client, "ja", &old_enough);
    let response = post_form(&client, "/ja/checkout", query(&to_confirm));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), "/ja/waiting-list-confirmation");
    assert_eq!(gateway.calls(), 0);

    let page = client.get("/ja/waiting-list-confirmation").dispatch();
    assert_eq!(page.status(), Status::Ok);

    let count = json(client.get("/api/current-participants").dispatch());
    assert_eq!(count["count"], 0);
}

#[test]
fn free_registration_needs_no_checkout() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);

    let child = "track=open&name=Sora&age=10&email=sora%40example.com&gender=other&events=running";
    let to_confirm = reach_confirm(&client, "en", child);
    let response = post_form(&client, "/en/checkout", query(&to_confirm));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), "/en/payment-success");
    assert_eq!(gateway.calls(), 0);

    let count = json(client.get("/api/current-participants").dispatch());
    assert_eq!(count["count"], 1);
}

#[test]
fn failing_checkout_stays_on_confirm() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);
    let to_confirm = reach_confirm(&client, "en", FAMILY);

    gateway.set_failing(true);
    let response = post_form(&client, "/en/checkout", query(&to_confirm));
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("checkout-error"));

    // the failed attempt doesn't count as submitted
    gateway.set_failing(false);
    let response = post_form(&client, "/en/checkout", query(&to_confirm));
    assert_eq!(response.status(), Status::SeeOther);
}

#[test]
fn payment_status_api_rejects_bad_sessions() {
    let gateway = Arc::new(MockPaymentGateway::new());
    let client = client(&gateway);

    let missing = client.get("/api/update-payment-status").dispatch();
    assert_eq!(missing.status(), Status::BadRequest);

    let unknown = client.get("/api/update-payment-status?session_id=cs_unknown").dispatch();
    assert_eq!(unknown.status(), Status::NotFound);

    // unrecorded sessions are turned away even while the processor is down
    gateway.set_failing(true);
    let unrecorded = client
        .get("/api/update-payment-status?session_id=cs_never_recorded")
        .dispatch();
    assert_eq!(unrecorded.status(), Status::NotFound);
    assert_eq!(gateway.calls(), 0);
    gateway.set_failing(false);

    let to_confirm = reach_confirm(&client, "en", FAMILY);
    post_form(&client, "/en/checkout", query(&to_confirm));
    gateway.set_failing(true);
    let failing = client.get("/api/update-payment-status?session_id=mock_1").dispatch();
    assert_eq!(failing.status(), Status::InternalServerError);

    let page = client.get("/en/payment-success?session_id=mock_1").dispatch();
    assert_eq!(page.status(), Status::Ok);
    assert!(page.into_string().unwrap().contains("status-failed"));
}
