use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use crate::{MedicationSchedule, VerificationTask};

/// Derives the stable identity of one reminder occurrence. The due instant is
/// truncated to the minute so that every recomputation of the same occurrence
/// lands on the same id, no matter when the tick ran.
pub fn reminder_id_for(user_id: &str, medicine_name: &str, due_at: OffsetDateTime) -> Uuid {
	let due_minute = due_at.unix_timestamp().div_euclid(60);
	let name = format!("{user_id}:{medicine_name}:{due_minute}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Emits one task per `times` entry whose occurrence falls within
/// `[window_start, window_end)`. Pure; safe to call with overlapping or
/// repeated windows because downstream persistence deduplicates on
/// `reminder_id`.
pub fn compute_due(
	schedule: &MedicationSchedule,
	window_start: OffsetDateTime,
	window_end: OffsetDateTime,
) -> Vec<VerificationTask> {
	let mut tasks = Vec::new();

	if !schedule.active || window_start >= window_end {
		return tasks;
	}

	let mut date = window_start.date();

	loop {
		for time_of_day in &schedule.times {
			let due_at = PrimitiveDateTime::new(date, *time_of_day).assume_utc();

			if due_at < window_start || due_at >= window_end {
				continue;
			}

			tasks.push(VerificationTask {
				reminder_id: reminder_id_for(&schedule.user_id, &schedule.medicine_name, due_at),
				user_id: schedule.user_id.clone(),
				medicine_name: schedule.medicine_name.clone(),
				scheduled_time: *time_of_day,
				due_at,
			});
		}

		if date >= window_end.date() {
			break;
		}

		let Some(next) = date.next_day() else {
			break;
		};

		date = next;
	}

	tasks.sort_by_key(|task| task.due_at);

	tasks
}

/// The window one scheduler tick covers: everything since the last successful
/// tick, clamped to `max_lookback` so a long outage does not replay unbounded
/// history. With no prior tick the full lookback is scanned; occurrences that
/// were already handled resolve to the same `reminder_id` and deduplicate at
/// the store.
pub fn tick_window(
	last_tick: Option<OffsetDateTime>,
	now: OffsetDateTime,
	max_lookback: Duration,
) -> (OffsetDateTime, OffsetDateTime) {
	let floor = now - max_lookback;
	let start = match last_tick {
		Some(tick) if tick > floor => tick,
		_ => floor,
	};

	(start.min(now), now)
}
