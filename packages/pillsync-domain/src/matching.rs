use unicode_normalization::UnicodeNormalization;

use crate::MatchStatus;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchPolicy {
	pub threshold: f32,
}
impl MatchPolicy {
	pub fn from_config(cfg: &pillsync_config::Matching) -> Self {
		Self { threshold: cfg.threshold }
	}
}
impl Default for MatchPolicy {
	fn default() -> Self {
		Self { threshold: 0.75 }
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MatchError {
	/// A schedule should never produce this; it is a configuration fault, not
	/// an evaluation outcome.
	#[error("The expected medicine name is empty.")]
	EmptyExpectedName,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult {
	pub status: MatchStatus,
	pub confidence: f32,
}

/// Decides whether OCR-extracted text corresponds to the expected medicine.
/// Deterministic: the same inputs always produce the same result.
pub fn evaluate(
	expected_name: &str,
	ocr_text: &str,
	policy: &MatchPolicy,
) -> Result<MatchResult, MatchError> {
	let expected = normalize(expected_name);

	if expected.is_empty() {
		return Err(MatchError::EmptyExpectedName);
	}

	let text = normalize(ocr_text);

	if text.is_empty() {
		return Ok(MatchResult { status: MatchStatus::Mismatch, confidence: 0.0 });
	}

	let confidence = score(&expected, &text);
	let status = if confidence >= policy.threshold {
		MatchStatus::Match
	} else {
		MatchStatus::Mismatch
	};

	Ok(MatchResult { status, confidence })
}

/// NFKC-folds, lowercases, folds glyphs OCR commonly confuses with letters,
/// and collapses everything that is not alphanumeric into single spaces.
fn normalize(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	let mut pending_space = false;

	for ch in input.nfkc().flat_map(char::to_lowercase) {
		let ch = fold_ocr_confusion(ch);

		if ch.is_alphanumeric() {
			if pending_space && !out.is_empty() {
				out.push(' ');
			}

			pending_space = false;

			out.push(ch);
		} else {
			pending_space = true;
		}
	}

	out
}

fn fold_ocr_confusion(ch: char) -> char {
	match ch {
		'0' => 'o',
		'1' => 'l',
		'5' => 's',
		_ => ch,
	}
}

fn score(expected: &str, text: &str) -> f32 {
	if text.contains(expected) {
		return 0.95;
	}

	let word_ratio = word_overlap_ratio(expected, text);
	let similarity = levenshtein_similarity(expected, text);

	if word_ratio >= 0.8 {
		0.85
	} else if similarity >= 0.7 {
		similarity
	} else if word_ratio >= 0.5 {
		word_ratio * 0.7
	} else {
		similarity * 0.5
	}
}

/// Share of the expected name's words that appear verbatim in the OCR text.
fn word_overlap_ratio(expected: &str, text: &str) -> f32 {
	let expected_words: Vec<&str> = expected.split(' ').filter(|word| !word.is_empty()).collect();

	if expected_words.is_empty() {
		return 0.0;
	}

	let matched = expected_words
		.iter()
		.filter(|word| text.split(' ').any(|candidate| candidate == **word))
		.count();

	matched as f32 / expected_words.len() as f32
}

fn levenshtein_similarity(a: &str, b: &str) -> f32 {
	let longest = a.chars().count().max(b.chars().count());

	if longest == 0 {
		return 1.0;
	}

	1.0 - levenshtein(a, b) as f32 / longest as f32
}

fn levenshtein(a: &str, b: &str) -> usize {
	let b_chars: Vec<char> = b.chars().collect();
	let mut row: Vec<usize> = (0..=b_chars.len()).collect();

	for (i, a_ch) in a.chars().enumerate() {
		let mut previous_diagonal = row[0];

		row[0] = i + 1;

		for (j, b_ch) in b_chars.iter().enumerate() {
			let substitution = previous_diagonal + usize::from(a_ch != *b_ch);

			previous_diagonal = row[j + 1];
			row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
		}
	}

	row[b_chars.len()]
}
