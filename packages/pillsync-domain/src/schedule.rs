use serde::{Deserialize, Serialize};
use time::Time;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
	Daily,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ScheduleError {
	#[error("The user id is empty.")]
	EmptyUserId,
	#[error("The medicine name is empty.")]
	EmptyMedicineName,
	#[error("An active schedule needs at least one time of day.")]
	EmptyTimes,
	#[error("The schedule repeats a time of day.")]
	DuplicateTime,
	#[error("Times of day must be HH:MM.")]
	InvalidTimeOfDay,
}

/// A user's dosing schedule for one medicine. Owned by the user and written
/// by the schedule UI; the pipeline only reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct MedicationSchedule {
	pub user_id: String,
	pub medicine_name: String,
	pub times: Vec<Time>,
	pub recurrence: Recurrence,
	pub active: bool,
}
impl MedicationSchedule {
	pub fn validate(&self) -> Result<(), ScheduleError> {
		if self.user_id.trim().is_empty() {
			return Err(ScheduleError::EmptyUserId);
		}
		if self.medicine_name.trim().is_empty() {
			return Err(ScheduleError::EmptyMedicineName);
		}
		if self.active && self.times.is_empty() {
			return Err(ScheduleError::EmptyTimes);
		}

		for (idx, t) in self.times.iter().enumerate() {
			if self.times[..idx].contains(t) {
				return Err(ScheduleError::DuplicateTime);
			}
		}

		Ok(())
	}
}

/// Parses an `HH:MM` time-of-day as the schedule UI stores it.
pub fn parse_time_of_day(raw: &str) -> Result<Time, ScheduleError> {
	let (hour, minute) = raw.split_once(':').ok_or(ScheduleError::InvalidTimeOfDay)?;
	let hour: u8 = hour.parse().map_err(|_| ScheduleError::InvalidTimeOfDay)?;
	let minute: u8 = minute.parse().map_err(|_| ScheduleError::InvalidTimeOfDay)?;

	Time::from_hms(hour, minute, 0).map_err(|_| ScheduleError::InvalidTimeOfDay)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_valid_time_of_day() {
		let t = parse_time_of_day("09:30").expect("parse failed");

		assert_eq!((t.hour(), t.minute()), (9, 30));
	}

	#[test]
	fn rejects_malformed_times() {
		assert_eq!(parse_time_of_day("9"), Err(ScheduleError::InvalidTimeOfDay));
		assert_eq!(parse_time_of_day("24:00"), Err(ScheduleError::InvalidTimeOfDay));
		assert_eq!(parse_time_of_day("09:60"), Err(ScheduleError::InvalidTimeOfDay));
		assert_eq!(parse_time_of_day("ab:cd"), Err(ScheduleError::InvalidTimeOfDay));
	}

	#[test]
	fn active_schedule_requires_times() {
		let schedule = MedicationSchedule {
			user_id: "u1".to_string(),
			medicine_name: "Metformin".to_string(),
			times: Vec::new(),
			recurrence: Recurrence::Daily,
			active: true,
		};

		assert_eq!(schedule.validate(), Err(ScheduleError::EmptyTimes));
	}

	#[test]
	fn errors_render_readable_messages() {
		assert_eq!(
			ScheduleError::EmptyTimes.to_string(),
			"An active schedule needs at least one time of day."
		);
		assert_eq!(ScheduleError::InvalidTimeOfDay.to_string(), "Times of day must be HH:MM.");
	}

	#[test]
	fn rejects_duplicate_times() {
		let t = parse_time_of_day("09:00").expect("parse failed");
		let schedule = MedicationSchedule {
			user_id: "u1".to_string(),
			medicine_name: "Metformin".to_string(),
			times: vec![t, t],
			recurrence: Recurrence::Daily,
			active: true,
		};

		assert_eq!(schedule.validate(), Err(ScheduleError::DuplicateTime));
	}
}
