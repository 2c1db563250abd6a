use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, identity::Identity};
use pillsync_storage::{db::Db, models::SosEventRow, queries};

pub struct SosRequest {
	pub location: String,
	pub note: Option<String>,
}

/// Records an SOS event. Anonymous callers are accepted; an emergency is not
/// the moment to demand a login, so their events land under the anonymous
/// principal. Alerting is someone else's job; this only persists the event.
pub async fn create(db: &Db, identity: &Identity, req: SosRequest) -> Result<SosEventRow> {
	let event = build_event(identity, req, OffsetDateTime::now_utc())?;

	queries::insert_sos_event(&db.pool, &event).await?;

	tracing::info!(sos_id = %event.sos_id, user_id = event.user_id.as_str(), "SOS event recorded.");

	Ok(event)
}

fn build_event(identity: &Identity, req: SosRequest, now: OffsetDateTime) -> Result<SosEventRow> {
	if req.location.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "location must be non-empty.".to_string() });
	}

	Ok(SosEventRow {
		sos_id: Uuid::new_v4(),
		user_id: identity.principal().to_string(),
		location: req.location,
		note: req.note.filter(|note| !note.trim().is_empty()),
		status: "active".to_string(),
		created_at: now,
	})
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn new_events_start_active() {
		let event = build_event(
			&Identity::User("alex".to_string()),
			SosRequest { location: "51.5072,-0.1276".to_string(), note: None },
			datetime!(2025-06-01 12:00 UTC),
		)
		.expect("build failed");

		assert_eq!(event.status, "active");
		assert_eq!(event.user_id, "alex");
	}

	#[test]
	fn anonymous_events_are_accepted_under_the_anonymous_principal() {
		let event = build_event(
			&Identity::Anonymous,
			SosRequest { location: "unknown".to_string(), note: Some("fell down".to_string()) },
			datetime!(2025-06-01 12:00 UTC),
		)
		.expect("build failed");

		assert_eq!(event.user_id, "anonymous");
		assert_eq!(event.note.as_deref(), Some("fell down"));
	}

	#[test]
	fn empty_location_is_rejected_and_blank_notes_dropped() {
		assert!(
			build_event(
				&Identity::Anonymous,
				SosRequest { location: "  ".to_string(), note: None },
				datetime!(2025-06-01 12:00 UTC),
			)
			.is_err()
		);

		let event = build_event(
			&Identity::Anonymous,
			SosRequest { location: "home".to_string(), note: Some("  ".to_string()) },
			datetime!(2025-06-01 12:00 UTC),
		)
		.expect("build failed");

		assert_eq!(event.note, None);
	}
}
