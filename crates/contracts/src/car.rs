//! Car - roster entry owned by the external store.

use serde::{Deserialize, Serialize};

use crate::{Achievement, EventId};

/// Car identifier
pub type CarId = u64;

/// A car entered in an event
///
/// The race core only reads identity and the defer flag, and appends
/// newly earned achievements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub car_id: CarId,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub nickname: Option<String>,

    pub event_id: EventId,

    /// Permanently excluded from scheduling while set
    #[serde(default)]
    pub deferred: bool,

    /// Earned badges, insertion ordered, no duplicates
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl Car {
    /// Create a car with no achievements
    pub fn new(car_id: CarId, name: impl Into<String>, event_id: EventId) -> Self {
        Self {
            car_id,
            name: name.into(),
            nickname: None,
            event_id,
            deferred: false,
            achievements: Vec::new(),
        }
    }

    /// Builder-style nickname
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn has_achievement(&self, achievement: Achievement) -> bool {
        self.achievements.contains(&achievement)
    }

    /// Append badges the car does not hold yet.
    ///
    /// Returns how many were actually added.
    pub fn award(&mut self, achievements: &[Achievement]) -> usize {
        let mut added = 0;
        for &achievement in achievements {
            if !self.has_achievement(achievement) {
                self.achievements.push(achievement);
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_award_skips_duplicates() {
        let mut car = Car::new(1, "Lightning", 7);
        assert_eq!(car.award(&[Achievement::ECar, Achievement::Top1]), 2);
        assert_eq!(car.award(&[Achievement::ECar, Achievement::Top5]), 1);
        assert_eq!(
            car.achievements,
            vec![Achievement::ECar, Achievement::Top1, Achievement::Top5]
        );
    }
}
