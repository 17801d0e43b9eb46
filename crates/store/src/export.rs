//! Results download as CSV.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use contracts::{CarId, ContractError, EventId, Lane, ResultId, Roster};

/// One exported line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub result_id: ResultId,
    pub lane: Lane,
    pub time: f64,
    pub place: u32,
    pub result_date: DateTime<Utc>,
    pub car_id: CarId,
    pub event_id: EventId,
    pub car_name: String,
}

const HEADER: [&str; 8] = [
    "resultId",
    "lane",
    "time",
    "place",
    "resultDate",
    "carId",
    "eventId",
    "carName",
];

/// Write every result of the roster's event, oldest first
///
/// Results whose car is missing from the roster are exported with an empty
/// name. An event without results still gets a header line. Returns the
/// number of rows written.
pub fn export_csv<W: Write>(roster: &Roster, writer: W) -> Result<usize, ContractError> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for result in roster
        .results
        .iter()
        .filter(|r| r.event_id == roster.event.event_id)
    {
        let car_name = roster
            .car(result.car_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        csv.serialize(ResultRow {
            result_id: result.result_id,
            lane: result.lane,
            time: result.time,
            place: result.place,
            result_date: result.date,
            car_id: result.car_id,
            event_id: result.event_id,
            car_name,
        })
        .map_err(|e| ContractError::Other(format!("csv export failed: {e}")))?;
        rows += 1;
    }

    if rows == 0 {
        csv.write_record(HEADER)
            .map_err(|e| ContractError::Other(format!("csv export failed: {e}")))?;
    }

    csv.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use contracts::{Car, RaceEvent, RaceResult};

    #[test]
    fn test_export_header_and_rows() {
        let date = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        let roster = Roster {
            event: RaceEvent {
                event_id: 5,
                name: "Pinewood".into(),
                multiplier: 1,
            },
            cars: vec![Car::new(8, "Turbo, Jr", 5)],
            results: vec![
                RaceResult {
                    result_id: 1,
                    car_id: 8,
                    event_id: 5,
                    lane: 2,
                    time: 3.25,
                    place: 1,
                    date,
                },
                RaceResult {
                    result_id: 2,
                    car_id: 9,
                    event_id: 5,
                    lane: 0,
                    time: 10.0,
                    place: 2,
                    date,
                },
            ],
        };

        let mut out = Vec::new();
        assert_eq!(export_csv(&roster, &mut out).unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "resultId,lane,time,place,resultDate,carId,eventId,carName"
        );
        assert_eq!(lines[1], "1,2,3.25,1,2024-03-09T14:30:00Z,8,5,\"Turbo, Jr\"");
        assert_eq!(lines[2], "2,0,10.0,2,2024-03-09T14:30:00Z,9,5,");
    }

    #[test]
    fn test_export_empty_event_writes_header() {
        let roster = Roster {
            event: RaceEvent {
                event_id: 5,
                name: "Pinewood".into(),
                multiplier: 1,
            },
            cars: vec![Car::new(8, "Turbo", 5)],
            results: Vec::new(),
        };

        let mut out = Vec::new();
        assert_eq!(export_csv(&roster, &mut out).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "resultId,lane,time,place,resultDate,carId,eventId,carName\n"
        );
    }
}
