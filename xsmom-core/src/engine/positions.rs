//! Position sizer — ranks to signed, equal-weight, dollar-neutral weights.
//!
//! Threshold rule for N assets and K names per side:
//! - rank <= K            -> +1/(2K)
//! - rank >= N - (K - 1)  -> -1/(2K)
//! - otherwise            -> 0
//!
//! The long band [1, K] and the short band [N-K+1, N] are each exactly K wide,
//! so a full row has K longs and K shorts summing to zero. The baseline K = 4
//! gives the fixed divisor of 8.

use crate::domain::{PositionPanel, RankPanel};
use crate::error::EngineError;

/// Weight of a single rank under the threshold rule.
pub fn position_weight(rank: usize, num_columns: usize, top_k: usize) -> f64 {
    let unit = 1.0 / (2 * top_k) as f64;
    if rank <= top_k {
        unit
    } else if rank + top_k > num_columns {
        // rank >= N - (K - 1), written without underflow
        -unit
    } else {
        0.0
    }
}

/// Map every rank cell through [`position_weight`].
///
/// Fails if `top_k` is zero, if `2 * top_k > num_columns` (overlapping
/// long/short bands), or if `num_columns` disagrees with the panel width.
pub fn compute_positions(
    ranks: &RankPanel,
    num_columns: usize,
    top_k: usize,
) -> Result<PositionPanel, EngineError> {
    validate_top_k(num_columns, top_k)?;
    if num_columns != ranks.width() {
        return Err(EngineError::invalid(
            "num_columns",
            format!(
                "{num_columns} does not match rank panel width {}",
                ranks.width()
            ),
        ));
    }
    Ok(ranks.map(|&rank| position_weight(rank, num_columns, top_k)))
}

/// `1 <= top_k` and `2 * top_k <= num_columns`.
pub fn validate_top_k(num_columns: usize, top_k: usize) -> Result<(), EngineError> {
    if top_k == 0 {
        return Err(EngineError::invalid("top_k", "must be >= 1"));
    }
    if top_k * 2 > num_columns {
        return Err(EngineError::invalid(
            "top_k",
            format!("2 * {top_k} exceeds the {num_columns}-asset universe (long and short sets overlap)"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Panel;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(12 * i)
    }

    fn ranks(rows: Vec<Vec<usize>>) -> RankPanel {
        let width = rows[0].len();
        let n = rows.len() as i64;
        Panel::new(
            (0..n).map(ts).collect(),
            (0..width).map(|i| format!("A{i:02}")).collect(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn baseline_ten_assets_top_four() {
        let weights: Vec<f64> = (1..=10).map(|r| position_weight(r, 10, 4)).collect();
        assert_eq!(
            weights,
            vec![0.125, 0.125, 0.125, 0.125, 0.0, 0.0, -0.125, -0.125, -0.125, -0.125]
        );
    }

    #[test]
    fn rows_are_dollar_neutral() {
        let p = compute_positions(&ranks(vec![vec![3, 1, 5, 2, 4, 6]]), 6, 2).unwrap();
        let row = p.row(0).unwrap();
        let long: f64 = row.iter().filter(|w| **w > 0.0).sum();
        let short: f64 = row.iter().filter(|w| **w < 0.0).sum();
        assert_eq!(long, 0.5);
        assert_eq!(short, -0.5);
        assert_eq!(row, &[0.0, 0.25, -0.25, 0.25, 0.0, -0.25]);
    }

    #[test]
    fn top_k_one_in_two_assets() {
        let p = compute_positions(&ranks(vec![vec![2, 1]]), 2, 1).unwrap();
        assert_eq!(p.row(0).unwrap(), &[-0.5, 0.5]);
    }

    #[test]
    fn overlapping_bands_rejected() {
        let r = ranks(vec![vec![1, 2, 3]]);
        assert!(matches!(
            compute_positions(&r, 3, 2),
            Err(EngineError::InvalidParameter { name: "top_k", .. })
        ));
        assert!(compute_positions(&r, 3, 0).is_err());
    }

    #[test]
    fn width_mismatch_rejected() {
        let r = ranks(vec![vec![1, 2, 3, 4]]);
        assert!(matches!(
            compute_positions(&r, 6, 1),
            Err(EngineError::InvalidParameter { name: "num_columns", .. })
        ));
    }
}
