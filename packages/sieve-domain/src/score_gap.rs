//! Adaptive truncation of a ranked list at its largest score drop.

pub const DEFAULT_MIN_SCORE_GAP: f64 = 0.01;

/// Finds the largest drop between adjacent scores of a descending list.
///
/// Returns `(cut, gap)` where `cut` is the index of the first item below the drop. The earliest
/// drop wins when two are equal.
pub fn largest_gap<T>(items: &[T], score: impl Fn(&T) -> f64) -> Option<(usize, f64)> {
	let mut best: Option<(usize, f64)> = None;

	for (idx, pair) in items.windows(2).enumerate() {
		let gap = score(&pair[0]) - score(&pair[1]);

		if gap.is_nan() {
			continue;
		}
		if best.map(|(_, best_gap)| gap > best_gap).unwrap_or(true) {
			best = Some((idx + 1, gap));
		}
	}

	best
}

/// Keeps the items above the largest score drop when that drop is at least `min_gap`; otherwise
/// returns `items` unchanged. `items` must already be sorted by descending score.
pub fn filter_by_score_gap<T>(
	mut items: Vec<T>,
	min_gap: f64,
	score: impl Fn(&T) -> f64,
) -> Vec<T> {
	if items.len() < 2 {
		return items;
	}

	if let Some((cut, gap)) = largest_gap(&items, score)
		&& gap >= min_gap
	{
		items.truncate(cut);
	}

	items
}
