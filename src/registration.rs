//! The registration aggregate: a representative plus any number of additional participants.

use serde::Serialize;
use serde_json::Value;

use crate::{
    fee::FeePolicy,
    participant::{
        optional_text, Participant, ParticipantInput, Representative, RepresentativeInput,
    },
    track::{AgeBounds, Track, TrackRules},
    transport::WizardParams,
    validation::ValidationErrors,
};

/// Keys of the carried wizard parameters.
pub mod keys {
    pub const TRACK: &str = "track";
    pub const NAME: &str = "name";
    pub const AGE: &str = "age";
    pub const EMAIL: &str = "email";
    pub const GENDER: &str = "gender";
    pub const EVENTS: &str = "events";
    pub const PHONE: &str = "phone";
    pub const NOTES: &str = "notes";
    pub const PARTICIPANTS: &str = "participants";
    pub const SIGNATURE: &str = "signature";
    pub const CLUB_EXPERIENCE: &str = "club_experience";
    pub const EXERCISE_FREQUENCY: &str = "exercise_frequency";
}

/// Optional questions asked on the waiting list form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Survey {
    pub club_experience: Option<String>,
    pub exercise_frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub track: Track,
    pub representative: Representative,
    /// In the order they were entered, which is also their display numbering.
    pub participants: Vec<Participant>,
    pub survey: Survey,
}

impl Registration {
    /// Validates the representative and every additional participant in one pass.
    ///
    /// # Errors
    ///
    /// Returns every failed field of every member, not just the first one.
    pub fn build(
        representative: &RepresentativeInput,
        participants: &[ParticipantInput],
        track: Track,
        rules: &TrackRules,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let representative = Representative::validate(
            representative,
            rules.representative_bounds(track),
            &mut errors,
        );
        // validate all of them before looking at the outcome, so no error goes unreported
        let participants: Vec<_> = participants
            .iter()
            .enumerate()
            .map(|(i, participant)| {
                Participant::validate(
                    participant,
                    AgeBounds::PARTICIPANT,
                    &format!("participants[{i}]"),
                    &mut errors,
                )
            })
            .collect();

        match (
            representative,
            participants.into_iter().collect::<Option<Vec<_>>>(),
        ) {
            (Some(representative), Some(participants)) if errors.is_empty() => Ok(Self {
                track,
                representative,
                participants,
                survey: Survey::default(),
            }),
            _ => Err(errors),
        }
    }

    /// Everybody taking part, representative first.
    pub fn members(&self) -> impl Iterator<Item = &Participant> {
        std::iter::once(&self.representative.person).chain(&self.participants)
    }

    /// Sum of the individual fees, derived fresh on every call.
    #[must_use]
    pub fn total_fee(&self) -> u32 {
        self.members().map(Participant::fee).sum()
    }

    #[must_use]
    pub fn headcount(&self) -> usize {
        1 + self.participants.len()
    }

    /// Headcounts of the free and the paying age bracket, in that order.
    #[must_use]
    pub fn bracket_counts(&self) -> (usize, usize) {
        let free = self
            .members()
            .filter(|member| FeePolicy::STANDARD.is_free(member.age))
            .count();
        (free, self.headcount() - free)
    }

    #[must_use]
    pub fn with_signature(mut self, signature: &str) -> Self {
        self.representative.signature = optional_text(signature);
        self
    }

    /// Flattens the registration for carrying it to the next wizard page.
    #[must_use]
    pub fn to_params(&self) -> WizardParams {
        let representative = &self.representative;
        let person = representative.person.to_input();

        let mut params = WizardParams::new();
        params.insert(keys::TRACK, self.track.as_str());
        params.insert(keys::NAME, person.name);
        params.insert(keys::AGE, person.age);
        params.insert(keys::EMAIL, representative.email.to_string());
        params.insert(keys::GENDER, person.gender);
        params.insert(keys::EVENTS, to_json(&person.events));
        params.insert(
            keys::PHONE,
            representative.phone.clone().unwrap_or_default(),
        );
        params.insert(
            keys::NOTES,
            representative.notes.clone().unwrap_or_default(),
        );
        params.insert(keys::PARTICIPANTS, to_json(&self.participants));

        for (key, value) in [
            (keys::SIGNATURE, &representative.signature),
            (keys::CLUB_EXPERIENCE, &self.survey.club_experience),
            (keys::EXERCISE_FREQUENCY, &self.survey.exercise_frequency),
        ] {
            if let Some(value) = value {
                params.insert(key, value.clone());
            }
        }
        params
    }

    /// Re-hydrates and re-validates a carried registration.
    ///
    /// # Errors
    ///
    /// Returns the validation failures of the carried data, see [`RegistrationDraft::validate`].
    pub fn from_params(
        params: &WizardParams,
        rules: &TrackRules,
    ) -> Result<Self, ValidationErrors> {
        RegistrationDraft::from_params(params).validate(rules)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| {
        log::error!("Couldn't serialize carried registration data: {err}");
        "[]".to_string()
    })
}

/// A registration as entered or as carried between pages, not validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationDraft {
    pub track: Track,
    pub representative: RepresentativeInput,
    pub participants: Vec<ParticipantInput>,
    pub signature: String,
    pub club_experience: String,
    pub exercise_frequency: String,
}

impl RegistrationDraft {
    /// Reads carried parameters without ever failing: missing values become empty strings,
    /// unparsable `events`/`participants` become empty lists.
    #[must_use]
    pub fn from_params(params: &WizardParams) -> Self {
        Self {
            track: Track::parse(params.get(keys::TRACK)).unwrap_or_default(),
            representative: RepresentativeInput {
                person: ParticipantInput {
                    name: params.get(keys::NAME).to_string(),
                    age: params.get(keys::AGE).to_string(),
                    gender: params.get(keys::GENDER).to_string(),
                    events: string_list(&parse_list(keys::EVENTS, params.get(keys::EVENTS))),
                },
                email: params.get(keys::EMAIL).to_string(),
                phone: params.get(keys::PHONE).to_string(),
                notes: params.get(keys::NOTES).to_string(),
            },
            participants: parse_list(keys::PARTICIPANTS, params.get(keys::PARTICIPANTS))
                .iter()
                .map(participant_from_json)
                .collect(),
            signature: params.get(keys::SIGNATURE).to_string(),
            club_experience: params.get(keys::CLUB_EXPERIENCE).to_string(),
            exercise_frequency: params.get(keys::EXERCISE_FREQUENCY).to_string(),
        }
    }

    /// Validates the draft under its own track. A present signature is kept as is, its absence
    /// is not an error here.
    ///
    /// # Errors
    ///
    /// Returns every failed field, see [`Registration::build`].
    pub fn validate(&self, rules: &TrackRules) -> Result<Registration, ValidationErrors> {
        let mut registration =
            Registration::build(&self.representative, &self.participants, self.track, rules)?
                .with_signature(&self.signature);
        registration.survey = Survey {
            club_experience: optional_text(&self.club_experience),
            exercise_frequency: optional_text(&self.exercise_frequency),
        };
        Ok(registration)
    }
}

fn parse_list(key: &str, text: &str) -> Vec<Value> {
    if text.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(text).unwrap_or_else(|err| {
        log::warn!("Dropping unparsable carried '{key}' parameter: {err}");
        Vec::new()
    })
}

fn string_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|value| value.as_str().map(ToString::to_string))
        .collect()
}

fn participant_from_json(value: &Value) -> ParticipantInput {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    ParticipantInput {
        name: text("name"),
        age: match value.get("age") {
            Some(Value::Number(age)) => age.to_string(),
            Some(Value::String(age)) => age.clone(),
            _ => String::new(),
        },
        gender: text("gender"),
        events: value
            .get("events")
            .and_then(Value::as_array)
            .map(|events| string_list(events))
            .unwrap_or_default(),
    }
}
