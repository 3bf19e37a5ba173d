//! Scenario catalog
//!
//! Descriptions shown in the briefing before a participant sees a dataset.

use crate::wire::ScenarioId;

const NO_MANAGER_NOTE: &str =
    "Some airfields have no manager, and these are listed with a manager value of \"NO MANAGER.\"";

/// Briefing text for one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioDetails {
    pub domain: &'static str,
    pub info: &'static str,
    pub note: Option<&'static str>,
}

const MOVIE_RATINGS: ScenarioDetails = ScenarioDetails {
    domain: "Movie",
    info: "This dataset describes information about various English-language movies and TV shows, \
           such as the title of the movie or TV show, the type of program it is (e.g. movie or TV \
           episode), and its MPAA or FCC rating (e.g. PG-13, R, TV-14).",
    note: None,
};

const MOVIE_GENRES: ScenarioDetails = ScenarioDetails {
    domain: "Movie",
    info: "This dataset describes information about various English-language movies and TV shows, \
           including the title of the movie or TV show, the genre of the program, the type of \
           program it is (e.g. movie or TV episode), and what year the program was released in.",
    note: None,
};

const AIRPORT_TYPES: ScenarioDetails = ScenarioDetails {
    domain: "Airport",
    info: "This dataset describes information about various airports and airfields, including the \
           name of the airfield, the type of airfield it is (airport, heliport, or seaplane base), \
           and the person, group, or entity managing the airfield.",
    note: Some(NO_MANAGER_NOTE),
};

const AIRPORT_OWNERS: ScenarioDetails = ScenarioDetails {
    domain: "Airport",
    info: "This dataset describes information about various airports and airfields, including the \
           name of the airfield, the person, group, or entity that owns the airfield, and the \
           person, group, or entity that manages the airfield.",
    note: Some(NO_MANAGER_NOTE),
};

const UNKNOWN_SCENARIO: ScenarioDetails = ScenarioDetails {
    domain: "Study",
    info: "A dataset from the study. Inspect the sample to find the patterns that hold over it.",
    note: None,
};

/// Details for a scenario id; unknown ids get a generic description
pub fn details(id: ScenarioId) -> &'static ScenarioDetails {
    match id {
        15 => &MOVIE_RATINGS,
        14 => &MOVIE_GENRES,
        8 => &AIRPORT_TYPES,
        11 | 13 => &AIRPORT_OWNERS,
        _ => &UNKNOWN_SCENARIO,
    }
}

/// Whether the catalog has a dedicated description for `id`
pub fn is_known(id: ScenarioId) -> bool {
    matches!(id, 8 | 11 | 13 | 14 | 15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airport_scenarios_carry_manager_note() {
        for id in [8, 11, 13] {
            assert_eq!(details(id).domain, "Airport");
            assert!(details(id).note.unwrap().contains("NO MANAGER"));
        }
    }

    #[test]
    fn test_movie_scenarios_have_no_note() {
        for id in [14, 15] {
            assert_eq!(details(id).domain, "Movie");
            assert!(details(id).note.is_none());
        }
    }

    #[test]
    fn test_unknown_scenario_falls_back() {
        assert!(!is_known(99));
        assert_eq!(details(99).domain, "Study");
    }
}
