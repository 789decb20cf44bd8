//! Pure `term → score` predicates shared by the search strategies. Each
//! returns a score in `[0, 200]`; the dispatcher filters on a per-strategy
//! minimum score (see `search.rs`).

/// Precomputed query state for a fuzzy search, reused across every
/// candidate so the per-candidate cost is just one scoring call.
pub struct FuzzyArgs {
	pub query: String,
	pub query_chars: Vec<char>,
}

impl FuzzyArgs {
	pub fn new(query: &str) -> FuzzyArgs {
		FuzzyArgs { query: query.to_owned(), query_chars: query.chars().collect() }
	}
}

/// 200 if some term equals the query exactly (case-insensitive); otherwise,
/// for the best term that starts with the query, `200` minus the extra
/// trailing length, floored at 140; `0` if no term starts with the query.
pub fn score_starts_with(terms: &[String], query: &str) -> u8 {
	let mut best = 0u8;
	for term in terms {
		let lower = term.to_lowercase();
		if lower == query {
			return 200;
		}
		if let Some(rest) = lower.strip_prefix(query) {
			let extra = rest.chars().count() as u8;
			let score = 200u8.saturating_sub(extra).max(140);
			best = best.max(score);
		}
	}
	best
}

/// 200 if a term's space-delimited words equal the query's; a declining
/// score (down to 140) for the count of matching leading words; `0` if the
/// first words differ.
pub fn score_word_match(terms: &[String], query: &str) -> u8 {
	let query_words: Vec<&str> = query.split(' ').filter(|w| !w.is_empty()).collect();
	if query_words.is_empty() {
		return 0;
	}

	let mut best = 0u8;
	for term in terms {
		let lower = term.to_lowercase();
		let term_words: Vec<&str> = lower.split(' ').filter(|w| !w.is_empty()).collect();
		if term_words.is_empty() || term_words[0] != query_words[0] {
			continue;
		}
		if term_words == query_words {
			return 200;
		}
		let matched = term_words
			.iter()
			.zip(query_words.iter())
			.take_while(|(a, b)| a == b)
			.count();
		let bonus = ((matched * 59) / query_words.len().max(1)) as u8;
		best = best.max(140 + bonus.min(59));
	}
	best
}

/// Edit-distance-based similarity in `[0, 200]`, `0` below a useful
/// threshold. `buff` is a scratch row reused across candidates by the
/// caller to avoid a per-candidate allocation; it grows (and is kept) to
/// fit the longest term seen so far.
pub fn score_fuzzy(terms: &[String], args: &FuzzyArgs, buff: &mut Vec<u16>) -> u8 {
	let mut best = 0u8;
	for term in terms {
		let lower = term.to_lowercase();
		let term_chars: Vec<char> = lower.chars().collect();
		if term_chars.is_empty() || args.query_chars.is_empty() {
			continue;
		}
		if buff.len() < term_chars.len() + 1 {
			buff.resize(term_chars.len() + 1, 0);
		}
		let distance = levenshtein(&args.query_chars, &term_chars, buff);
		if distance > term_chars.len() {
			continue;
		}
		let longer = args.query_chars.len().max(term_chars.len());
		let similarity = 1.0 - (distance as f64 / longer as f64);
		let score = (similarity * 200.0).round() as u8;
		best = best.max(score);
	}
	best
}

/// Single-row Levenshtein distance. `buff` must have length at least
/// `b.len() + 1`; callers typically reuse one `Vec<u16>` across many calls.
fn levenshtein(a: &[char], b: &[char], buff: &mut [u16]) -> usize {
	let width = b.len() + 1;
	assert!(buff.len() >= width, "fuzzy scratch buffer too small");

	for (j, slot) in buff.iter_mut().take(width).enumerate() {
		*slot = j as u16;
	}

	for (i, &ac) in a.iter().enumerate() {
		let mut prev_diag = buff[0];
		buff[0] = (i + 1) as u16;
		for (j, &bc) in b.iter().enumerate() {
			let cur = buff[j + 1];
			let cost = if ac == bc { 0 } else { 1 };
			buff[j + 1] = (prev_diag + cost).min(buff[j] + 1).min(cur + 1);
			prev_diag = cur;
		}
	}

	buff[width - 1] as usize
}

/// Shared glob/regex term scorer: a pattern match scores `200 - len` for
/// short terms, floored at `180` for long ones.
pub fn score_pattern_match(term_len: usize) -> u8 {
	if term_len < 20 {
		200 - term_len as u8
	} else {
		180
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn starts_with_exact_match_scores_200() {
		assert_eq!(score_starts_with(&[String::from("Apple")], "apple"), 200);
	}

	#[test]
	fn starts_with_prefix_scores_between_140_and_200() {
		let score = score_starts_with(&[String::from("application")], "app");
		assert!((140..200).contains(&score));
	}

	#[test]
	fn starts_with_no_match_scores_0() {
		assert_eq!(score_starts_with(&[String::from("banana")], "app"), 0);
	}

	#[test]
	fn word_match_exact_scores_200() {
		assert_eq!(score_word_match(&[String::from("new york")], "new york"), 200);
	}

	#[test]
	fn word_match_different_first_word_scores_0() {
		assert_eq!(score_word_match(&[String::from("new york")], "old york"), 0);
	}

	#[test]
	fn fuzzy_identical_terms_score_200() {
		let args = FuzzyArgs::new("apple");
		let mut buff: Vec<u16> = vec![0u16; 64];
		assert_eq!(score_fuzzy(&[String::from("apple")], &args, &mut buff), 200);
	}

	#[test]
	fn pattern_score_floors_at_180_for_long_terms() {
		assert_eq!(score_pattern_match(25), 180);
		assert_eq!(score_pattern_match(5), 195);
	}
}
