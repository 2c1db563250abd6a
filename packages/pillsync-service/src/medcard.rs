use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
	Error, Result,
	identity::{CaregiverDirectory, Identity},
};
use pillsync_storage::{db::Db, models::MedCardRow, queries};

pub struct GenerateMedCard {
	pub patient_id: String,
	pub profile: Value,
	pub medicines: Value,
	/// Falls back to `medcard.default_ttl_minutes` from config.
	pub ttl_minutes: Option<i64>,
}

#[derive(Debug)]
pub enum MedCardLookup {
	Found(MedCardRow),
	/// The token existed but its expiry has passed. Distinct from `NotFound`
	/// so the share page can say the card lapsed rather than never existed.
	Expired,
	NotFound,
}

/// Issues a read-only shareable med card for a patient. Only the patient
/// themselves or a registered caregiver may generate one; anonymous callers
/// are refused outright.
pub async fn generate(
	cfg: &pillsync_config::MedCard,
	db: &Db,
	directory: &dyn CaregiverDirectory,
	identity: &Identity,
	req: GenerateMedCard,
) -> Result<MedCardRow> {
	let card = build_card(cfg, directory, identity, req, OffsetDateTime::now_utc())?;

	queries::insert_med_card(&db.pool, &card).await?;

	Ok(card)
}

pub async fn lookup(db: &Db, token: &str, now: OffsetDateTime) -> Result<MedCardLookup> {
	let row = queries::fetch_med_card(&db.pool, token).await?;

	Ok(classify(row, now))
}

fn build_card(
	cfg: &pillsync_config::MedCard,
	directory: &dyn CaregiverDirectory,
	identity: &Identity,
	req: GenerateMedCard,
	now: OffsetDateTime,
) -> Result<MedCardRow> {
	let Identity::User(caller) = identity else {
		return Err(Error::InvalidRequest {
			message: "Med card generation requires an authenticated identity.".to_string(),
		});
	};

	if req.patient_id.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "patient_id must be non-empty.".to_string() });
	}
	if caller != &req.patient_id && !directory.is_caregiver_for(caller, &req.patient_id) {
		return Err(Error::InvalidRequest {
			message: "Only the patient or a registered caregiver may generate a med card."
				.to_string(),
		});
	}

	let ttl = req.ttl_minutes.unwrap_or(cfg.default_ttl_minutes);

	if ttl <= 0 {
		return Err(Error::InvalidRequest {
			message: "ttl_minutes must be greater than zero.".to_string(),
		});
	}

	Ok(MedCardRow {
		token: Uuid::new_v4().simple().to_string(),
		owner_user_id: req.patient_id,
		generated_by: caller.clone(),
		profile: req.profile,
		medicines: req.medicines,
		read_only: true,
		created_at: now,
		expires_at: now + Duration::minutes(ttl),
	})
}

fn classify(card: Option<MedCardRow>, now: OffsetDateTime) -> MedCardLookup {
	match card {
		Some(card) if card.expires_at <= now => MedCardLookup::Expired,
		Some(card) => MedCardLookup::Found(card),
		None => MedCardLookup::NotFound,
	}
}
