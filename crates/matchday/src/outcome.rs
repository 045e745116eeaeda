//! Match outcome from the tracked team's perspective.
//!
//! Shared by ingestion and the yearly statistics so both agree on what
//! counts as a win.

use std::cmp::Ordering;

use crate::types::{Location, Outcome};

pub fn calculate(home_score: Option<u32>, away_score: Option<u32>, location: Location) -> Outcome {
    let (Some(home), Some(away)) = (home_score, away_score) else {
        return Outcome::Scheduled;
    };

    let (tracked, opponent) = match location {
        Location::Home => (home, away),
        Location::Away => (away, home),
    };

    match tracked.cmp(&opponent) {
        Ordering::Greater => Outcome::Win,
        Ordering::Less => Outcome::Lose,
        Ordering::Equal => Outcome::Draw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_results() {
        assert_eq!(calculate(Some(2), Some(0), Location::Home), Outcome::Win);
        assert_eq!(calculate(Some(0), Some(2), Location::Home), Outcome::Lose);
        assert_eq!(calculate(Some(1), Some(1), Location::Home), Outcome::Draw);
    }

    #[test]
    fn test_away_results_use_away_score() {
        assert_eq!(calculate(Some(2), Some(0), Location::Away), Outcome::Lose);
        assert_eq!(calculate(Some(0), Some(3), Location::Away), Outcome::Win);
        assert_eq!(calculate(Some(0), Some(0), Location::Away), Outcome::Draw);
    }

    #[test]
    fn test_missing_score_is_scheduled() {
        for location in [Location::Home, Location::Away] {
            assert_eq!(calculate(None, None, location), Outcome::Scheduled);
            assert_eq!(calculate(Some(1), None, location), Outcome::Scheduled);
            assert_eq!(calculate(None, Some(1), location), Outcome::Scheduled);
        }
    }
}
