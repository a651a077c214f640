use std::collections::{BTreeMap, HashMap};

use rocket::{form::Form, response::Redirect, Route, State};
use rocket_dyn_templates::{context, Template};
use serde::Serialize;

use crate::{
    config::Config,
    i18n::Locale,
    participant::{Activity, Gender, ParticipantInput, RepresentativeInput},
    registration::RegistrationDraft,
    routes::{field_messages, Layout},
    track::Track,
    transport::WizardParams,
    validation::ValidationErrors,
    wizard::{self, WizardStep},
};

#[must_use]
pub fn routes() -> Vec<Route> {
    routes![register_page, submit]
}

/// A radio button or checkbox.
#[derive(Debug, Serialize)]
struct Choice {
    value: &'static str,
    label: &'static str,
    checked: bool,
}

#[derive(Debug, Serialize)]
struct PersonView {
    /// Position in the participant list, absent for the representative.
    index: Option<usize>,
    /// Display numbering, the representative being 1.
    number: usize,
    name: String,
    age: String,
    genders: Vec<Choice>,
    events: Vec<Choice>,
    /// Messages by field name, like `age`.
    errors: BTreeMap<String, String>,
}

impl PersonView {
    fn new(
        input: &ParticipantInput,
        index: Option<usize>,
        lang: Locale,
        messages: &BTreeMap<String, String>,
    ) -> Self {
        let prefix = index.map(|i| format!("participants[{i}]."));
        let errors = messages
            .iter()
            .filter_map(|(path, message)| {
                let field = match &prefix {
                    Some(prefix) => path.strip_prefix(prefix.as_str())?,
                    None if path.starts_with("participants[") => return None,
                    None => path.as_str(),
                };
                Some((field.to_string(), message.clone()))
            })
            .collect();

        Self {
            index,
            number: index.map_or(1, |i| i + 2),
            name: input.name.clone(),
            age: input.age.clone(),
            genders: Gender::ALL
                .into_iter()
                .map(|gender| Choice {
                    value: gender.as_str(),
                    label: gender.label(lang),
                    checked: input.gender == gender.as_str(),
                })
                .collect(),
            events: Activity::CATALOG
                .into_iter()
                .map(|activity| Choice {
                    value: activity.tag(),
                    label: activity.label(lang),
                    checked: input.events.iter().any(|tag| tag == activity.tag()),
                })
                .collect(),
            errors,
        }
    }
}

fn render(lang: Locale, draft: &RegistrationDraft, errors: Option<&ValidationErrors>) -> Template {
    let messages = field_messages(errors, lang);
    let representative = &draft.representative;

    Template::render(
        "register",
        context! {
            layout: Layout::new(lang),
            track: draft.track,
            is_waiting_list: draft.track == Track::WaitingList,
            representative: PersonView::new(&representative.person, None, lang, &messages),
            email: &representative.email,
            phone: &representative.phone,
            notes: &representative.notes,
            club_experience: &draft.club_experience,
            exercise_frequency: &draft.exercise_frequency,
            participants: draft
                .participants
                .iter()
                .enumerate()
                .map(|(i, participant)| PersonView::new(participant, Some(i), lang, &messages))
                .collect::<Vec<_>>(),
            has_errors: !messages.is_empty(),
        },
    )
}

/// The register page, pre-filled from carried parameters if there are any.
#[get("/<lang>/register?<params..>")]
pub fn register_page(lang: Locale, params: HashMap<String, String>) -> Template {
    let draft = RegistrationDraft::from_params(&WizardParams::from(params));
    render(lang, &draft, None)
}

#[derive(Debug, FromForm)]
pub struct ParticipantForm {
    #[field(default = String::new())]
    name: String,
    #[field(default = String::new())]
    age: String,
    #[field(default = String::new())]
    gender: String,
    events: Vec<String>,
}

impl ParticipantForm {
    fn to_input(&self) -> ParticipantInput {
        ParticipantInput {
            name: self.name.clone(),
            age: self.age.clone(),
            gender: self.gender.clone(),
            events: self.events.clone(),
        }
    }
}

/// The register form as returned by the frontend.
#[derive(Debug, FromForm)]
pub struct RegisterForm {
    #[field(default = String::new())]
    track: String,
    #[field(default = String::new())]
    name: String,
    #[field(default = String::new())]
    age: String,
    #[field(default = String::new())]
    email: String,
    #[field(default = String::new())]
    gender: String,
    events: Vec<String>,
    #[field(default = String::new())]
    phone: String,
    #[field(default = String::new())]
    notes: String,
    participants: Vec<ParticipantForm>,
    #[field(default = String::new())]
    club_experience: String,
    #[field(default = String::new())]
    exercise_frequency: String,

    /// Set by the "add participant" button, which re-renders the form instead of submitting it.
    add_participant: Option<String>,
    /// Index of the participant whose "remove" button was pressed.
    remove_participant: Option<usize>,
}

impl RegisterForm {
    fn to_draft(&self) -> RegistrationDraft {
        RegistrationDraft {
            track: Track::parse(&self.track).unwrap_or_default(),
            representative: RepresentativeInput {
                person: ParticipantInput {
                    name: self.name.clone(),
                    age: self.age.clone(),
                    gender: self.gender.clone(),
                    events: self.events.clone(),
                },
                email: self.email.clone(),
                phone: self.phone.clone(),
                notes: self.notes.clone(),
            },
            participants: self.participants.iter().map(ParticipantForm::to_input).collect(),
            signature: String::new(),
            club_experience: self.club_experience.clone(),
            exercise_frequency: self.exercise_frequency.clone(),
        }
    }
}

#[post("/<lang>/register", data = "<form>")]
pub fn submit(
    lang: Locale,
    config: &State<Config>,
    form: Form<RegisterForm>,
) -> Result<Redirect, Template> {
    let mut draft = form.to_draft();

    if form.add_participant.is_some() {
        draft.participants.push(ParticipantInput::default());
        return Err(render(lang, &draft, None));
    }
    if let Some(index) = form.remove_participant {
        if index < draft.participants.len() {
            draft.participants.remove(index);
        }
        return Err(render(lang, &draft, None));
    }

    match wizard::submit_register(&draft, &config.track_rules()) {
        Ok(params) => Ok(Redirect::to(WizardStep::Disclaimer.location(lang, &params))),
        Err(errors) => {
            log::info!("Register form came back with {} invalid field(s)", errors.len());
            Err(render(lang, &draft, Some(&errors)))
        }
    }
}
