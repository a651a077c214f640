#![allow(
    clippy::no_effect_underscore_binding, // Rocket heavily uses those in macros
    clippy::needless_pass_by_value,  // The request guards should take them by value anyways
)]

#[macro_use]
extern crate rocket;

pub mod config;
pub mod fee;
pub mod i18n;
pub mod mail;
pub mod participant;
pub mod payment;
pub mod registration;
pub mod routes;
pub mod sheet;
pub mod submissions;
pub mod track;
pub mod transport;
pub mod validation;
pub mod wizard;
#[cfg(test)]
mod tests;

use figment::Figment;
use rocket::{
    fairing::AdHoc,
    fs::{relative, FileServer},
    Build, Rocket,
};
use rocket_dyn_templates::{handlebars::handlebars_helper, Template};
use rocket_sync_db_pools::{database, rusqlite};

use crate::{config::Config, sheet::DatabaseStatus, submissions::DuplicateGuard};

pub use routes::routes;

#[database("registrations")]
pub struct RegistrationsDBConn(rusqlite::Connection);

fn init_sheet() -> AdHoc {
    AdHoc::try_on_ignite("Registration sheet", |rocket| async {
        let Some(conn) = RegistrationsDBConn::get_one(&rocket).await else {
            log::error!("No database connection available for the registration sheet");
            return Err(rocket);
        };

        match conn.run(|c| sheet::init_db_if_necessary(c)).await {
            Ok(DatabaseStatus::Created) => {
                log::info!("Created the registration sheet");
                Ok(rocket)
            }
            Ok(DatabaseStatus::AlreadyExistent) => Ok(rocket),
            Err(err) => {
                log::error!("Couldn't create the registration sheet: {err}");
                Err(rocket)
            }
        }
    })
}

/// Assembles the application on top of the given configuration.
#[must_use]
pub fn build(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Template::custom(|engines| {
            engines
                .handlebars
                .register_escape_fn(ammonia::clean_text);

            handlebars_helper!(equals: |left_hand: String, right_hand: String| left_hand == right_hand);
            handlebars_helper!(translate: |lang: String, key: String| {
                let locale = i18n::Locale::parse(&lang).unwrap_or(i18n::FALLBACK);
                i18n::lookup(locale, &key).to_string()
            });

            engines.handlebars.register_helper("equals", Box::new(equals));
            engines.handlebars.register_helper("t", Box::new(translate));
        }))
        .attach(AdHoc::config::<Config>())
        .attach(RegistrationsDBConn::fairing())
        .attach(init_sheet())
        .attach(AdHoc::on_ignite("Duplicate submission guard", |rocket| async {
            let window = rocket.state::<Config>().map_or(
                chrono::Duration::seconds(DuplicateGuard::DEFAULT_WINDOW_SECS),
                Config::duplicate_window,
            );
            rocket.manage(DuplicateGuard::in_memory(window))
        }))
        .attach(payment::fairing())
        .mount("/", routes())
        .mount("/static", FileServer::from(relative!("/static")))
}

/// The application as configured by `Rocket.toml` and the environment.
#[must_use]
pub fn rocket() -> Rocket<Build> {
    build(rocket::Config::figment())
}
