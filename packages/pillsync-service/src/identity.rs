//! Caller identity. Anonymity is an explicit class, not a synthetic user: an
//! unauthenticated caller gets `Identity::Anonymous` and only the operations
//! that accept anonymous principals (SOS intake) will serve it.

/// Who is making the request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Identity {
	User(String),
	Anonymous,
}
impl Identity {
	pub fn user_id(&self) -> Option<&str> {
		match self {
			Self::User(id) => Some(id),
			Self::Anonymous => None,
		}
	}

	/// The principal recorded against writes this identity makes.
	pub fn principal(&self) -> &str {
		match self {
			Self::User(id) => id,
			Self::Anonymous => "anonymous",
		}
	}
}

/// Maps a bearer token to a user id. Token issuance lives elsewhere; this
/// side only ever checks.
pub trait TokenVerifier
where
	Self: Send + Sync,
{
	fn verify(&self, token: &str) -> Option<String>;
}

/// Answers whether one user may act for another's medication profile.
pub trait CaregiverDirectory
where
	Self: Send + Sync,
{
	fn is_caregiver_for(&self, caregiver_id: &str, patient_id: &str) -> bool;
}

/// Resolves an `Authorization` header value to an identity. Missing, empty,
/// or unverifiable tokens all resolve to `Anonymous`; they never error.
pub fn resolve(bearer: Option<&str>, verifier: &dyn TokenVerifier) -> Identity {
	let Some(raw) = bearer else {
		return Identity::Anonymous;
	};
	let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();

	if token.is_empty() {
		return Identity::Anonymous;
	}

	match verifier.verify(token) {
		Some(user_id) => Identity::User(user_id),
		None => Identity::Anonymous,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct OneUser;
	impl TokenVerifier for OneUser {
		fn verify(&self, token: &str) -> Option<String> {
			(token == "tok-alex").then(|| "alex".to_string())
		}
	}

	#[test]
	fn resolves_known_token_with_and_without_scheme() {
		assert_eq!(resolve(Some("Bearer tok-alex"), &OneUser), Identity::User("alex".to_string()));
		assert_eq!(resolve(Some("tok-alex"), &OneUser), Identity::User("alex".to_string()));
	}

	#[test]
	fn missing_or_unknown_tokens_are_anonymous() {
		assert_eq!(resolve(None, &OneUser), Identity::Anonymous);
		assert_eq!(resolve(Some(""), &OneUser), Identity::Anonymous);
		assert_eq!(resolve(Some("Bearer "), &OneUser), Identity::Anonymous);
		assert_eq!(resolve(Some("Bearer forged"), &OneUser), Identity::Anonymous);
	}

	#[test]
	fn anonymous_writes_under_the_anonymous_principal() {
		assert_eq!(Identity::Anonymous.principal(), "anonymous");
		assert_eq!(Identity::Anonymous.user_id(), None);
		assert_eq!(Identity::User("alex".to_string()).principal(), "alex");
	}
}
