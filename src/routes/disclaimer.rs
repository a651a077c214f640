use std::collections::HashMap;

use rocket::{form::Form, response::Redirect, Route, State};
use rocket_dyn_templates::{context, Template};

use crate::{
    config::Config,
    i18n::Locale,
    routes::{field_messages, Layout},
    transport::WizardParams,
    validation::ValidationErrors,
    wizard::{self, Consent, Review, WizardStep, AGREEMENT_FIELD, SIGNATURE_FIELD},
};

#[must_use]
pub fn routes() -> Vec<Route> {
    routes![disclaimer_page, submit]
}

fn render(
    lang: Locale,
    params: &WizardParams,
    review: &Review,
    errors: Option<&ValidationErrors>,
) -> Template {
    let (name, headcount, carried_data_broken) = match review {
        Review::Valid(registration) => (
            registration.representative.person.name.clone(),
            registration.headcount(),
            false,
        ),
        Review::Invalid { draft, .. } => (
            draft.representative.person.name.clone(),
            1 + draft.participants.len(),
            true,
        ),
    };

    Template::render(
        "disclaimer",
        context! {
            layout: Layout::new(lang),
            params,
            name,
            headcount,
            carried_data_broken,
            register_location: WizardStep::Register.location(lang, params),
            errors: field_messages(errors, lang),
        },
    )
}

#[get("/<lang>/disclaimer?<params..>")]
pub fn disclaimer_page(
    lang: Locale,
    config: &State<Config>,
    params: HashMap<String, String>,
) -> Template {
    let params = WizardParams::from(params);
    let review = wizard::review(&params, &config.track_rules());
    render(lang, &params, &review, None)
}

#[post("/<lang>/disclaimer", data = "<form>")]
pub fn submit(
    lang: Locale,
    config: &State<Config>,
    form: Form<HashMap<String, String>>,
) -> Result<Redirect, Template> {
    let mut params = WizardParams::from(form.into_inner());
    // the consent fields are entered here, they're not part of what was carried
    let consent = Consent {
        agreed: params.remove(AGREEMENT_FIELD).is_some(),
        signature: params.remove(SIGNATURE_FIELD).unwrap_or_default(),
    };
    let rules = config.track_rules();

    match wizard::submit_disclaimer(&params, &consent, &rules) {
        Ok(signed) => Ok(Redirect::to(WizardStep::Confirm.location(lang, &signed))),
        Err(errors) => {
            let review = wizard::review(&params, &rules);
            Err(render(lang, &params, &review, Some(&errors)))
        }
    }
}
