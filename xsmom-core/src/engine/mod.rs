//! Signal pipeline — prices to net portfolio returns.
//!
//! Every step is a pure function from one immutable panel to the next:
//!
//! 1. Returns: fractional change per period
//! 2. Ranks: trailing-sum momentum, ranked across assets per row
//! 3. Positions: long the top K, short the bottom K, equal weight
//! 4. Costs: one-period lag plus turnover cost
//!
//! [`evaluate`] fixes that order. [`latest_signal`] ranks only the last row.

pub mod cost_model;
pub mod evaluator;
pub mod latest;
pub mod positions;
pub mod rank;
pub mod returns;

pub use cost_model::{apply_costs, CostModel, NetReturns};
pub use evaluator::{evaluate, evaluate_from_returns, Evaluation};
pub use latest::{latest_signal, LatestSignal, RankedAsset};
pub use positions::{compute_positions, position_weight, validate_top_k};
pub use rank::{compute_ranks, rank_scores, ranking_order, trailing_sums};
pub use returns::compute_returns;
