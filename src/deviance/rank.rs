use std::cmp::Ordering;

/// Rank values in descending order, 1 = largest.
///
/// Ties receive distinct consecutive ranks in input order: of two equal values the one that
/// comes first gets the smaller rank. This equals `(n + 1) - ordinal_rank_ascending` for
/// distinct values. `NaN` values rank after every other value, in input order among
/// themselves.
pub fn descending_ranks(values: &[f64]) -> Vec<usize> {
    let mut indexed_values: Vec<(usize, f64)> =
        values.iter().enumerate().map(|(i, &v)| (i, v)).collect();

    // stable, so ties keep input order
    indexed_values.sort_by(|a, b| descending_nan_last(a.1, b.1));

    let mut ranks = vec![0; values.len()];
    for (rank, (original_idx, _)) in indexed_values.iter().enumerate() {
        ranks[*original_idx] = rank + 1;
    }

    ranks
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
