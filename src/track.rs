use std::fmt;

use serde::Serialize;

/// The eligibility ruleset a registration runs under. Chosen by the page the user started from,
/// never inferred from the entered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Track {
    #[default]
    Open,
    WaitingList,
}

impl Track {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::WaitingList => "waiting-list",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "open" => Some(Self::Open),
            "waiting-list" => Some(Self::WaitingList),
            _ => None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive bounds for an entered age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBounds {
    pub min: u8,
    pub max: u8,
}

impl AgeBounds {
    /// What every additional participant is held to, whatever the track.
    pub const PARTICIPANT: Self = Self { min: 0, max: 100 };
}

/// Minimum representative age per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackRules {
    pub open_min_age: u8,
    pub waiting_list_min_age: u8,
}

impl Default for TrackRules {
    fn default() -> Self {
        Self {
            open_min_age: 0,
            waiting_list_min_age: 21,
        }
    }
}

impl TrackRules {
    #[must_use]
    pub const fn representative_bounds(&self, track: Track) -> AgeBounds {
        let min = match track {
            Track::Open => self.open_min_age,
            Track::WaitingList => self.waiting_list_min_age,
        };
        AgeBounds {
            min,
            max: AgeBounds::PARTICIPANT.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_waiting_list_has_an_age_floor_by_default() {
        let rules = TrackRules::default();
        assert_eq!(
            rules.representative_bounds(Track::Open),
            AgeBounds::PARTICIPANT
        );
        assert_eq!(
            rules.representative_bounds(Track::WaitingList),
            AgeBounds { min: 21, max: 100 }
        );
    }

    #[test]
    fn tags_parse_back() {
        for track in [Track::Open, Track::WaitingList] {
            assert_eq!(Track::parse(track.as_str()), Some(track));
        }
        assert_eq!(Track::parse("vip"), None);
    }
}
