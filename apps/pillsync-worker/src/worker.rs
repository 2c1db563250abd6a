use std::{sync::Arc, time::Duration as StdDuration};

use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use pillsync_domain::{compute_due, tick_window};
use pillsync_service::{AdherenceService, run_task};
use pillsync_storage::{db::Db, queries};

const MEDCARD_PURGE_INTERVAL_SECONDS: i64 = 900;

/// The scheduler loop. Each tick covers the window since the last successful
/// tick and spawns one pipeline execution per due occurrence; a failed tick
/// leaves `last_tick` alone so the next one re-covers the same window.
pub async fn run_worker(service: AdherenceService, db: Db) -> Result<()> {
	let service = Arc::new(service);
	let tick_interval = StdDuration::from_secs(service.cfg.scheduler.tick_interval_secs);
	let max_lookback = Duration::hours(service.cfg.scheduler.max_lookback_hours);
	let mut last_tick: Option<OffsetDateTime> = None;
	let mut last_purge = OffsetDateTime::now_utc();

	tracing::info!(
		tick_interval_secs = service.cfg.scheduler.tick_interval_secs,
		max_lookback_hours = service.cfg.scheduler.max_lookback_hours,
		"Worker started."
	);

	loop {
		let now = OffsetDateTime::now_utc();

		match run_tick(&service, &db, last_tick, now, max_lookback).await {
			Ok(spawned) => {
				last_tick = Some(now);

				if spawned > 0 {
					tracing::info!(tasks = spawned, "Scheduler tick dispatched tasks.");
				}
			},
			Err(err) => {
				tracing::error!(error = %err, "Scheduler tick failed. The window will be retried.");
			},
		}

		if now - last_purge >= Duration::seconds(MEDCARD_PURGE_INTERVAL_SECONDS) {
			match queries::purge_expired_med_cards(&db.pool, now).await {
				Ok(count) => {
					if count > 0 {
						tracing::info!(count, "Purged expired med cards.");
					}

					last_purge = now;
				},
				Err(err) => {
					tracing::error!(error = %err, "Med card purge failed.");
				},
			}
		}

		tokio_time::sleep(tick_interval).await;
	}
}

async fn run_tick(
	service: &Arc<AdherenceService>,
	db: &Db,
	last_tick: Option<OffsetDateTime>,
	now: OffsetDateTime,
	max_lookback: Duration,
) -> Result<usize> {
	let (start, end) = tick_window(last_tick, now, max_lookback);
	let schedules = queries::list_active_schedules(&db.pool).await?;
	let mut spawned = 0;

	for schedule in &schedules {
		for task in compute_due(schedule, start, end) {
			let service = service.clone();

			tokio::spawn(async move {
				if let Err(err) = run_task(&service, &task).await {
					tracing::error!(
						reminder_id = %task.reminder_id,
						user_id = task.user_id.as_str(),
						medicine_name = task.medicine_name.as_str(),
						error = %err,
						"Verification task failed."
					);
				}
			});

			spawned += 1;
		}
	}

	Ok(spawned)
}
