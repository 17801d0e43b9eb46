//! Achievement badges awarded after a race.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

/// Performance badge
///
/// Serialized with its display label, which is also the identifier stored
/// on the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Achievement {
    #[serde(rename = "e-Car")]
    ECar,
    #[serde(rename = "pi-Car")]
    PiCar,
    #[serde(rename = "Exactly 3 Seconds")]
    Exactly3Seconds,
    #[serde(rename = "Exactly 4 Seconds")]
    Exactly4Seconds,
    #[serde(rename = "Off-Road Vehicle")]
    OffRoadVehicle,
    #[serde(rename = "Fuel-Efficient Vehicle")]
    FuelEfficientVehicle,
    #[serde(rename = "Top 1%")]
    Top1,
    #[serde(rename = "Top 5%")]
    Top5,
    #[serde(rename = "Top 10%")]
    Top10,
    #[serde(rename = "By a Nose")]
    ByANose,
    #[serde(rename = "Photo Finish")]
    PhotoFinish,
    #[serde(rename = "Come From Behind")]
    ComeFromBehind,
    #[serde(rename = "Second Every Time")]
    SecondEveryTime,
    #[serde(rename = "Steady Racer")]
    SteadyRacer,
    #[serde(rename = "Faster Each Race")]
    FasterEachRace,
    #[serde(rename = "Fastest Last")]
    FastestLast,
    #[serde(rename = "Unpredictable")]
    Unpredictable,
}

impl Achievement {
    pub const ALL: [Achievement; 17] = [
        Achievement::ECar,
        Achievement::PiCar,
        Achievement::Exactly3Seconds,
        Achievement::Exactly4Seconds,
        Achievement::OffRoadVehicle,
        Achievement::FuelEfficientVehicle,
        Achievement::Top1,
        Achievement::Top5,
        Achievement::Top10,
        Achievement::ByANose,
        Achievement::PhotoFinish,
        Achievement::ComeFromBehind,
        Achievement::SecondEveryTime,
        Achievement::SteadyRacer,
        Achievement::FasterEachRace,
        Achievement::FastestLast,
        Achievement::Unpredictable,
    ];

    /// Display label (also the stored identifier)
    pub fn label(self) -> &'static str {
        match self {
            Achievement::ECar => "e-Car",
            Achievement::PiCar => "pi-Car",
            Achievement::Exactly3Seconds => "Exactly 3 Seconds",
            Achievement::Exactly4Seconds => "Exactly 4 Seconds",
            Achievement::OffRoadVehicle => "Off-Road Vehicle",
            Achievement::FuelEfficientVehicle => "Fuel-Efficient Vehicle",
            Achievement::Top1 => "Top 1%",
            Achievement::Top5 => "Top 5%",
            Achievement::Top10 => "Top 10%",
            Achievement::ByANose => "By a Nose",
            Achievement::PhotoFinish => "Photo Finish",
            Achievement::ComeFromBehind => "Come From Behind",
            Achievement::SecondEveryTime => "Second Every Time",
            Achievement::SteadyRacer => "Steady Racer",
            Achievement::FasterEachRace => "Faster Each Race",
            Achievement::FastestLast => "Fastest Last",
            Achievement::Unpredictable => "Unpredictable",
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Achievement {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Achievement::ALL
            .iter()
            .copied()
            .find(|a| a.label() == s)
            .ok_or_else(|| ContractError::Other(format!("unknown achievement '{s}'")))
    }
}
