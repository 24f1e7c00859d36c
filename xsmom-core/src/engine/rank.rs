//! Rank transform — trailing-sum momentum scores ranked across assets.
//!
//! Window convention: the score at row t is the sum of returns t-L+1..=t, so
//! the window includes the current period. Rows before the first full window
//! are dropped (never imputed): the rank panel has `returns.len() - L + 1` rows.
//!
//! Tie-break: equal scores are ordered by ascending asset identifier (byte
//! order); the earlier identifier gets the better (smaller) rank. Ranks are
//! ordinal, so every row is a permutation of 1..=N.

use std::cmp::Ordering;

use crate::domain::{Panel, RankPanel, ReturnPanel};
use crate::error::EngineError;

/// Rank every row of a return panel by its trailing `lookback`-period sum.
///
/// `lookback` must satisfy `1 <= lookback < returns.len()`.
pub fn compute_ranks(returns: &ReturnPanel, lookback: usize) -> Result<RankPanel, EngineError> {
    if lookback == 0 {
        return Err(EngineError::invalid("lookback", "must be >= 1"));
    }
    if lookback >= returns.len() {
        return Err(EngineError::invalid(
            "lookback",
            format!(
                "must be < number of return rows ({}), got {lookback}",
                returns.len()
            ),
        ));
    }

    let scores = trailing_sums(returns, lookback);
    let rows: Vec<Vec<usize>> = scores
        .iter()
        .map(|s| rank_scores(s, returns.assets()))
        .collect();

    Ok(Panel::from_parts(
        returns.timestamps()[lookback - 1..].to_vec(),
        returns.assets().to_vec(),
        rows,
    ))
}

/// Trailing `lookback`-period sums for every full window.
///
/// Each window is summed oldest to newest, so a point-in-time read over the
/// same returns reproduces the same bits.
pub fn trailing_sums(returns: &ReturnPanel, lookback: usize) -> Vec<Vec<f64>> {
    let rows = returns.rows();
    if lookback == 0 || lookback > rows.len() {
        return Vec::new();
    }
    (lookback - 1..rows.len())
        .map(|t| window_sum(&rows[t + 1 - lookback..=t], returns.width()))
        .collect()
}

/// Column sums of a block of rows, accumulated in row order.
pub(crate) fn window_sum(window: &[Vec<f64>], width: usize) -> Vec<f64> {
    let mut sums = vec![0.0; width];
    for row in window {
        for (s, r) in sums.iter_mut().zip(row) {
            *s += r;
        }
    }
    sums
}

/// Ordinal ranks of one cross-section, 1 = highest score.
///
/// Ties go to the smaller asset identifier. NaN scores sort last.
pub fn rank_scores(scores: &[f64], assets: &[String]) -> Vec<usize> {
    debug_assert_eq!(scores.len(), assets.len());
    let order = ranking_order(scores, assets);
    let mut ranks = vec![0; scores.len()];
    for (position, &idx) in order.iter().enumerate() {
        ranks[idx] = position + 1;
    }
    ranks
}

/// Column indices sorted strongest first, using the rank tie-break.
pub fn ranking_order(scores: &[f64], assets: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        compare_desc(scores[a], scores[b]).then_with(|| assets[a].cmp(&assets[b]))
    });
    order
}

fn compare_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(12 * i)
    }

    fn names(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn returns(rows: Vec<Vec<f64>>, ids: &[&str]) -> ReturnPanel {
        let n = rows.len() as i64;
        Panel::new((0..n).map(ts).collect(), names(ids), rows).unwrap()
    }

    #[test]
    fn rank_scores_descending() {
        let ranks = rank_scores(&[0.1, 0.3, 0.2, 0.4], &names(&["A", "B", "C", "D"]));
        assert_eq!(ranks, vec![4, 2, 3, 1]);
    }

    #[test]
    fn ties_break_by_identifier() {
        // C and A tie; A sorts first by identifier and gets the better rank.
        let ranks = rank_scores(&[0.5, 0.1, 0.5], &names(&["C", "B", "A"]));
        assert_eq!(ranks, vec![2, 3, 1]);
    }

    #[test]
    fn nan_scores_rank_last() {
        let ranks = rank_scores(&[f64::NAN, 0.1, -0.2], &names(&["A", "B", "C"]));
        assert_eq!(ranks, vec![3, 1, 2]);
    }

    #[test]
    fn lookback_one_ranks_each_row() {
        let r = returns(
            vec![vec![0.1, 0.2], vec![0.3, -0.1], vec![0.0, 0.0]],
            &["A", "B"],
        );
        let ranks = compute_ranks(&r, 1).unwrap();
        // L = 1: no rows dropped
        assert_eq!(ranks.len(), 3);
        assert_eq!(ranks.timestamps(), r.timestamps());
        assert_eq!(ranks.row(0).unwrap(), &[2, 1]);
        assert_eq!(ranks.row(1).unwrap(), &[1, 2]);
        // tie -> identifier order
        assert_eq!(ranks.row(2).unwrap(), &[1, 2]);
    }

    #[test]
    fn window_includes_current_row() {
        let r = returns(
            vec![
                vec![0.10, 0.00],
                vec![0.00, 0.05],
                vec![-0.20, 0.00],
                vec![0.00, 0.01],
            ],
            &["A", "B"],
        );
        let ranks = compute_ranks(&r, 3).unwrap();
        assert_eq!(ranks.len(), 2); // 4 - 3 + 1
        assert_eq!(ranks.timestamps(), &[ts(2), ts(3)]);
        // row 2: A = 0.10 + 0 - 0.20 = -0.10, B = 0.05
        assert_eq!(ranks.row(0).unwrap(), &[2, 1]);
        // row 3: A = 0 - 0.20 + 0 = -0.20, B = 0.06
        assert_eq!(ranks.row(1).unwrap(), &[2, 1]);
    }

    #[test]
    fn lookback_at_boundary() {
        let r = returns(vec![vec![0.1, 0.2]; 5], &["A", "B"]);
        // L = len - 1 is the largest legal window: two rank rows
        assert_eq!(compute_ranks(&r, 4).unwrap().len(), 2);
        assert!(matches!(
            compute_ranks(&r, 5),
            Err(EngineError::InvalidParameter { name: "lookback", .. })
        ));
        assert!(compute_ranks(&r, 0).is_err());
    }

    #[test]
    fn trailing_sums_match_direct_sum() {
        let r = returns(
            vec![vec![0.01, 0.02], vec![0.03, 0.04], vec![0.05, 0.06]],
            &["A", "B"],
        );
        let sums = trailing_sums(&r, 2);
        assert_eq!(sums.len(), 2);
        assert!((sums[0][0] - 0.04).abs() < 1e-12);
        assert!((sums[1][1] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn ranking_order_strongest_first() {
        let order = ranking_order(&[0.2, 0.9, -0.1], &names(&["A", "B", "C"]));
        assert_eq!(order, vec![1, 0, 2]);
    }
}
