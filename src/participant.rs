//! Single members of a registration and the rules each of them is checked against.

use std::collections::BTreeSet;

use lettre::Address;
use serde::{Deserialize, Serialize};

use crate::{
    fee,
    i18n::{self, Locale},
    track::AgeBounds,
    validation::{field_path, ValidationErrors, Violation},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Self; 3] = [Self::Male, Self::Female, Self::Other];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|gender| gender.as_str() == value.trim())
    }

    #[must_use]
    pub fn label(self, locale: Locale) -> &'static str {
        i18n::lookup(
            locale,
            match self {
                Self::Male => "gender.male",
                Self::Female => "gender.female",
                Self::Other => "gender.other",
            },
        )
    }
}

/// An event of the festival a participant can sign up for. The declaration order is the catalog
/// order, which is also the order selections are kept and shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Running,
    Obstacle,
    Relay,
    BallGame,
    TugOfWar,
    Dance,
    TailTag,
}

impl Activity {
    pub const CATALOG: [Self; 7] = [
        Self::Running,
        Self::Obstacle,
        Self::Relay,
        Self::BallGame,
        Self::TugOfWar,
        Self::Dance,
        Self::TailTag,
    ];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Obstacle => "obstacle",
            Self::Relay => "relay",
            Self::BallGame => "ballgame",
            Self::TugOfWar => "tugofwar",
            Self::Dance => "dance",
            Self::TailTag => "tailtag",
        }
    }

    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::CATALOG
            .into_iter()
            .find(|activity| activity.tag() == tag.trim())
    }

    #[must_use]
    pub fn label(self, locale: Locale) -> &'static str {
        i18n::lookup(
            locale,
            match self {
                Self::Running => "events.running",
                Self::Obstacle => "events.obstacle",
                Self::Relay => "events.relay",
                Self::BallGame => "events.ballgame",
                Self::TugOfWar => "events.tugofwar",
                Self::Dance => "events.dance",
                Self::TailTag => "events.tailtag",
            },
        )
    }
}

/// A participant as entered, before anything was checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantInput {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub events: BTreeSet<Activity>,
}

impl Participant {
    /// Checks every field of `input`, recording each failure under `prefix` into `errors`.
    /// Returns the participant only if all fields passed.
    pub fn validate(
        input: &ParticipantInput,
        bounds: AgeBounds,
        prefix: &str,
        errors: &mut ValidationErrors,
    ) -> Option<Self> {
        let name = required_text(&input.name, &field_path(prefix, "name"), errors);
        let age = validate_age(&input.age, bounds, &field_path(prefix, "age"), errors);
        let gender = Gender::parse(&input.gender);
        if gender.is_none() {
            errors.push(field_path(prefix, "gender"), Violation::UnknownGender);
        }
        let events = validate_events(&input.events, &field_path(prefix, "events"), errors);

        Some(Self {
            name: name?,
            age: age?,
            gender: gender?,
            events: events?,
        })
    }

    #[must_use]
    pub fn fee(&self) -> u32 {
        fee::fee_of(self.age)
    }

    #[must_use]
    pub fn to_input(&self) -> ParticipantInput {
        ParticipantInput {
            name: self.name.clone(),
            age: self.age.to_string(),
            gender: self.gender.as_str().to_string(),
            events: self
                .events
                .iter()
                .map(|activity| activity.tag().to_string())
                .collect(),
        }
    }
}

/// The representative as entered: a participant plus contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepresentativeInput {
    pub person: ParticipantInput,
    pub email: String,
    pub phone: String,
    pub notes: String,
}

/// The person who registers, pays and is contacted for everybody in the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representative {
    pub person: Participant,
    pub email: Address,
    pub phone: Option<String>,
    pub notes: Option<String>,
    /// The typed name given as signature on the disclaimer, absent before that page.
    pub signature: Option<String>,
}

impl Representative {
    /// Like [`Participant::validate`], with the representative's own age bounds and the
    /// additional email requirement. Fields are recorded at the top level (`name`, `email`, ...).
    pub fn validate(
        input: &RepresentativeInput,
        bounds: AgeBounds,
        errors: &mut ValidationErrors,
    ) -> Option<Self> {
        let person = Participant::validate(&input.person, bounds, "", errors);

        let email = input.email.trim();
        let email = if email.is_empty() {
            errors.push("email", Violation::Required);
            None
        } else if let Ok(address) = email.parse::<Address>() {
            Some(address)
        } else {
            errors.push("email", Violation::InvalidEmail);
            None
        };

        Some(Self {
            person: person?,
            email: email?,
            phone: optional_text(&input.phone),
            notes: optional_text(&input.notes),
            signature: None,
        })
    }

    #[must_use]
    pub fn to_input(&self) -> RepresentativeInput {
        RepresentativeInput {
            person: self.person.to_input(),
            email: self.email.to_string(),
            phone: self.phone.clone().unwrap_or_default(),
            notes: self.notes.clone().unwrap_or_default(),
        }
    }
}

fn required_text(value: &str, path: &str, errors: &mut ValidationErrors) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(path, Violation::Required);
        None
    } else {
        Some(value.to_string())
    }
}

/// Empty and whitespace-only text is treated as not given.
#[must_use]
pub fn optional_text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn validate_age(
    value: &str,
    bounds: AgeBounds,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<u8> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(path, Violation::Required);
        return None;
    }
    let Ok(age) = value.parse::<i64>() else {
        errors.push(path, Violation::NotANumber);
        return None;
    };

    if age < i64::from(bounds.min) {
        errors.push(path, Violation::AgeBelow { min: bounds.min });
        None
    } else if age > i64::from(bounds.max) {
        errors.push(path, Violation::AgeAbove { max: bounds.max });
        None
    } else {
        u8::try_from(age).ok()
    }
}

fn validate_events(
    tags: &[String],
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<BTreeSet<Activity>> {
    if tags.is_empty() {
        errors.push(path, Violation::NoEvents);
        return None;
    }

    let mut events = BTreeSet::new();
    let mut unknown = false;
    for tag in tags {
        match Activity::parse(tag) {
            Some(activity) => {
                events.insert(activity);
            }
            None => {
                unknown = true;
                errors.push(path, Violation::UnknownEvent { tag: tag.clone() });
            }
        }
    }

    (!unknown).then_some(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, age: &str, gender: &str, events: &[&str]) -> ParticipantInput {
        ParticipantInput {
            name: name.to_string(),
            age: age.to_string(),
            gender: gender.to_string(),
            events: events.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn accepts_a_complete_participant() {
        let mut errors = ValidationErrors::new();
        let participant = Participant::validate(
            &input("  Hanako ", "8", "female", &["relay", "running", "relay"]),
            AgeBounds::PARTICIPANT,
            "participants[0]",
            &mut errors,
        )
        .unwrap();

        assert!(errors.is_empty());
        assert_eq!(participant.name, "Hanako");
        assert_eq!(participant.age, 8);
        assert_eq!(participant.gender, Gender::Female);
        // kept as a set, in catalog order
        assert_eq!(
            participant.events.into_iter().collect::<Vec<_>>(),
            vec![Activity::Running, Activity::Relay]
        );
    }

    #[test]
    fn no_events_always_fails() {
        let mut errors = ValidationErrors::new();
        let participant = Participant::validate(
            &input("Taro", "30", "male", &[]),
            AgeBounds::PARTICIPANT,
            "",
            &mut errors,
        );

        assert!(participant.is_none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("events"), Some(&Violation::NoEvents));
    }

    #[test]
    fn reports_every_broken_field_with_its_path() {
        let mut errors = ValidationErrors::new();
        let participant = Participant::validate(
            &input("", "101", "robot", &["running", "curling"]),
            AgeBounds::PARTICIPANT,
            "participants[2]",
            &mut errors,
        );

        assert!(participant.is_none());
        assert_eq!(
            errors.get("participants[2].name"),
            Some(&Violation::Required)
        );
        assert_eq!(
            errors.get("participants[2].age"),
            Some(&Violation::AgeAbove { max: 100 })
        );
        assert_eq!(
            errors.get("participants[2].gender"),
            Some(&Violation::UnknownGender)
        );
        assert_eq!(
            errors.get("participants[2].events"),
            Some(&Violation::UnknownEvent {
                tag: "curling".to_string()
            })
        );
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn age_must_be_a_number() {
        let mut errors = ValidationErrors::new();
        Participant::validate(
            &input("Taro", "ten", "male", &["dance"]),
            AgeBounds::PARTICIPANT,
            "",
            &mut errors,
        );
        assert_eq!(errors.get("age"), Some(&Violation::NotANumber));

        let mut errors = ValidationErrors::new();
        Participant::validate(
            &input("Taro", "-1", "male", &["dance"]),
            AgeBounds::PARTICIPANT,
            "",
            &mut errors,
        );
        assert_eq!(errors.get("age"), Some(&Violation::AgeBelow { min: 0 }));
    }

    #[test]
    fn representative_needs_a_valid_email() {
        let mut representative = RepresentativeInput {
            person: input("Taro", "40", "male", &["tugofwar"]),
            email: "not an address".to_string(),
            phone: " ".to_string(),
            notes: String::new(),
        };

        let mut errors = ValidationErrors::new();
        assert!(
            Representative::validate(&representative, AgeBounds::PARTICIPANT, &mut errors)
                .is_none()
        );
        assert_eq!(errors.get("email"), Some(&Violation::InvalidEmail));

        representative.email = " taro@example.org ".to_string();
        let mut errors = ValidationErrors::new();
        let valid =
            Representative::validate(&representative, AgeBounds::PARTICIPANT, &mut errors)
                .unwrap();
        assert_eq!(valid.email.to_string(), "taro@example.org");
        assert_eq!(valid.phone, None);
        assert_eq!(valid.signature, None);
    }

    #[test]
    fn labels_follow_the_locale() {
        assert_eq!(Activity::TailTag.label(Locale::En), "Tail Tag");
        assert_eq!(Activity::TailTag.label(Locale::Ja), "しっぽ取り");
        assert_eq!(Gender::Female.label(Locale::Ja), "女性");
    }
}
