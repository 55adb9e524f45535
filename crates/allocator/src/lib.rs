//! # MarketMatch Allocator
//!
//! Turns target weights and a cash budget into share quantities.
//!
//! Fees are first-class: every position records its own fee, and the summary
//! satisfies `total_invested + total_fees + leftover_cash == budget` exactly.
//! Realized weights are recomputed from the allocated values and reported next to
//! the optimizer's targets.
//!
//! ## Public API
//!
//! - `allocate`: the allocation itself.
//! - `AllocationPolicy`: share mode, fee model and fee timing.
//! - `Allocation` / `Position`: the auditable result.

use configuration::{AllocationSettings, FeeModel, FeeTiming};
use optimizer::PortfolioWeight;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;
use std::collections::HashMap;

pub mod error;
pub mod fees;

pub use error::AllocationError;
pub use fees::{Lot, fee_for, shares_within};

/// How weights are turned into trades.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPolicy {
    pub lot: Lot,
    pub fee_model: FeeModel,
    pub fee_timing: FeeTiming,
}

impl AllocationPolicy {
    pub fn from_settings(settings: &AllocationSettings) -> Self {
        Self {
            lot: Lot {
                mode: settings.share_mode,
                decimals: settings.share_decimals,
            },
            fee_model: settings.fee_model.clone(),
            fee_timing: settings.fee_timing,
        }
    }
}

/// A single holding after allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub ticker: String,
    pub shares: Decimal,
    pub price: Decimal,
    /// `shares * price`, fees excluded.
    pub value: Decimal,
    pub fee: Decimal,
    pub target_weight: f64,
    /// `value / total_invested`.
    pub realized_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub positions: Vec<Position>,
    pub budget: Decimal,
    pub total_invested: Decimal,
    pub total_fees: Decimal,
    pub leftover_cash: Decimal,
}

impl Allocation {
    /// Invested value plus fees, i.e. the cash that actually left the account.
    pub fn final_value(&self) -> Decimal {
        self.total_invested + self.total_fees
    }

    /// Realized weights keyed by ticker, in position order.
    pub fn realized_weights(&self) -> Vec<(String, f64)> {
        self.positions
            .iter()
            .map(|p| (p.ticker.clone(), p.realized_weight))
            .collect()
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.ticker == ticker)
    }
}

/// Allocates `budget` across `weights` at `prices`.
///
/// Weights are rescaled by their sum so that rounding in the optimizer never lets
/// the targets exceed the budget.
pub fn allocate(
    weights: &[PortfolioWeight],
    prices: &HashMap<String, Decimal>,
    budget: Decimal,
    policy: &AllocationPolicy,
) -> Result<Allocation, AllocationError> {
    if budget <= Decimal::ZERO {
        return Err(AllocationError::InvalidBudget(budget));
    }

    // 1. Validate inputs and convert weights to exact fractions.
    let mut legs = Vec::with_capacity(weights.len());
    for w in weights {
        let price = *prices
            .get(&w.ticker)
            .ok_or_else(|| AllocationError::MissingPrice(w.ticker.clone()))?;
        if price <= Decimal::ZERO {
            return Err(AllocationError::InvalidPrice {
                ticker: w.ticker.clone(),
                price,
            });
        }
        let fraction = Decimal::from_f64(w.weight)
            .filter(|f| *f >= Decimal::ZERO)
            .ok_or_else(|| AllocationError::InvalidWeight {
                ticker: w.ticker.clone(),
                weight: w.weight,
            })?;
        legs.push((w, price, fraction));
    }
    let weight_sum: Decimal = legs.iter().map(|(_, _, f)| *f).sum();
    if weight_sum <= Decimal::ZERO {
        return Err(AllocationError::InvalidWeight {
            ticker: String::new(),
            weight: 0.0,
        });
    }

    // 2. Decide how much cash the targets are drawn from.
    let investable = match policy.fee_timing {
        FeeTiming::WithinPosition => budget,
        FeeTiming::BeforeAllocation => {
            let estimated: Decimal = legs
                .iter()
                .map(|(_, price, fraction)| {
                    let shares = policy.lot.quantize(budget * *fraction / weight_sum / *price);
                    fee_for(&policy.fee_model, shares, shares * *price)
                })
                .sum();
            (budget - estimated).max(Decimal::ZERO)
        }
    };

    // 3. Size each position.
    let mut positions = Vec::with_capacity(legs.len());
    for (w, price, fraction) in legs {
        let target = investable * fraction / weight_sum;
        let shares = match policy.fee_timing {
            FeeTiming::WithinPosition => shares_within(&policy.fee_model, target, price, policy.lot),
            FeeTiming::BeforeAllocation => policy.lot.quantize(target / price),
        };
        let value = shares * price;
        let fee = fee_for(&policy.fee_model, shares, value);
        if shares.is_zero() {
            tracing::warn!(
                ticker = %w.ticker,
                target = %target,
                price = %price,
                "Target value too small to buy a single lot after fees."
            );
        }
        positions.push(Position {
            ticker: w.ticker.clone(),
            shares,
            price,
            value,
            fee,
            target_weight: w.weight,
            realized_weight: 0.0,
        });
    }

    // 4. Realized weights and the cash identity.
    let total_invested: Decimal = positions.iter().map(|p| p.value).sum();
    let total_fees: Decimal = positions.iter().map(|p| p.fee).sum();
    let leftover_cash = budget - total_invested - total_fees;
    if total_invested > Decimal::ZERO {
        for p in &mut positions {
            p.realized_weight = (p.value / total_invested).to_f64().unwrap_or(0.0);
        }
    }

    tracing::info!(
        positions = positions.len(),
        budget = %budget,
        invested = %total_invested,
        fees = %total_fees,
        leftover = %leftover_cash,
        "Allocation complete."
    );

    Ok(Allocation {
        positions,
        budget,
        total_invested,
        total_fees,
        leftover_cash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::ShareMode;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn weights(pairs: &[(&str, f64)]) -> Vec<PortfolioWeight> {
        pairs
            .iter()
            .map(|(t, w)| PortfolioWeight {
                ticker: t.to_string(),
                weight: *w,
            })
            .collect()
    }

    fn prices(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    fn policy(mode: ShareMode, fee_model: FeeModel, fee_timing: FeeTiming) -> AllocationPolicy {
        AllocationPolicy {
            lot: Lot { mode, decimals: 4 },
            fee_model,
            fee_timing,
        }
    }

    fn assert_round_trip(a: &Allocation) {
        assert_eq!(a.total_invested + a.leftover_cash + a.total_fees, a.budget);
        let summed: Decimal = a.positions.iter().map(|p| p.value + p.fee).sum();
        assert_eq!(summed, a.total_invested + a.total_fees);
        assert!(a.leftover_cash >= Decimal::ZERO);
    }

    #[test]
    fn default_policy_matches_per_share_broker_fees() {
        let w = weights(&[("RY.TO", 0.5), ("AAPL", 0.5)]);
        let p = prices(&[("RY.TO", dec!(150)), ("AAPL", dec!(300))]);
        let policy = AllocationPolicy::from_settings(&AllocationSettings::default());
        let a = allocate(&w, &p, dec!(1000000), &policy).unwrap();

        // 500k at 150 is ~3333 shares, below the 3950-share cap.
        let ry = a.position("RY.TO").unwrap();
        assert!(ry.fee < dec!(3.95));
        assert_eq!(ry.fee, ry.shares * dec!(0.001));
        assert_round_trip(&a);
    }

    #[test]
    fn per_share_fee_caps_on_large_orders() {
        let w = weights(&[("PENNY", 1.0)]);
        let p = prices(&[("PENNY", dec!(2))]);
        let policy = AllocationPolicy::from_settings(&AllocationSettings::default());
        let a = allocate(&w, &p, dec!(100000), &policy).unwrap();
        let pos = a.position("PENNY").unwrap();
        assert_eq!(pos.fee, dec!(3.95));
        assert_eq!(pos.value + pos.fee + a.leftover_cash, dec!(100000));
        assert!(a.leftover_cash < dec!(2));
    }

    #[test]
    fn whole_shares_floor_and_leave_cash() {
        let w = weights(&[("A", 0.6), ("B", 0.4)]);
        let p = prices(&[("A", dec!(333)), ("B", dec!(70))]);
        let a = allocate(&w, &p, dec!(10000), &policy(ShareMode::Whole, FeeModel::None, FeeTiming::WithinPosition)).unwrap();
        assert_eq!(a.position("A").unwrap().shares, dec!(18));
        assert_eq!(a.position("B").unwrap().shares, dec!(57));
        assert_eq!(a.total_fees, Decimal::ZERO);
        assert_eq!(a.leftover_cash, dec!(10000) - dec!(5994) - dec!(3990));
        assert_round_trip(&a);
    }

    #[test]
    fn realized_weights_differ_from_targets_after_rounding() {
        let w = weights(&[("A", 0.6), ("B", 0.4)]);
        let p = prices(&[("A", dec!(333)), ("B", dec!(70))]);
        let a = allocate(&w, &p, dec!(10000), &policy(ShareMode::Whole, FeeModel::None, FeeTiming::WithinPosition)).unwrap();
        let pos = a.position("A").unwrap();
        assert_eq!(pos.target_weight, 0.6);
        assert!((pos.realized_weight - 5994.0 / 9984.0).abs() < 1e-12);
        let total: f64 = a.positions.iter().map(|p| p.realized_weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn position_that_cannot_cover_its_fee_is_skipped() {
        let w = weights(&[("BIG", 0.999), ("TINY", 0.001)]);
        let p = prices(&[("BIG", dec!(10)), ("TINY", dec!(10))]);
        let flat = FeeModel::Flat { per_trade: dec!(5) };
        let a = allocate(&w, &p, dec!(1000), &policy(ShareMode::Fractional, flat, FeeTiming::WithinPosition)).unwrap();
        let tiny = a.position("TINY").unwrap();
        assert_eq!(tiny.shares, Decimal::ZERO);
        assert_eq!(tiny.fee, Decimal::ZERO);
        assert_eq!(tiny.realized_weight, 0.0);
        assert_round_trip(&a);
    }

    #[test]
    fn fees_before_allocation_shrink_the_budget_first() {
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let p = prices(&[("A", dec!(10)), ("B", dec!(20))]);
        let flat = FeeModel::Flat { per_trade: dec!(10) };
        let a = allocate(&w, &p, dec!(1000), &policy(ShareMode::Fractional, flat, FeeTiming::BeforeAllocation)).unwrap();
        // 20 in fees come off the top, 490 is then invested per leg.
        assert_eq!(a.total_fees, dec!(20));
        assert_eq!(a.total_invested, dec!(980));
        assert_eq!(a.leftover_cash, Decimal::ZERO);
        assert_round_trip(&a);
    }

    #[test]
    fn missing_price_is_an_error() {
        let w = weights(&[("A", 1.0)]);
        let err = allocate(&w, &HashMap::new(), dec!(1000), &AllocationPolicy::from_settings(&AllocationSettings::default())).unwrap_err();
        assert!(matches!(err, AllocationError::MissingPrice(ref t) if t == "A"));
    }

    #[test]
    fn non_positive_budget_is_an_error() {
        let w = weights(&[("A", 1.0)]);
        let p = prices(&[("A", dec!(1))]);
        let err = allocate(&w, &p, Decimal::ZERO, &AllocationPolicy::from_settings(&AllocationSettings::default())).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidBudget(_)));
    }

    fn arb_fee_model() -> impl Strategy<Value = FeeModel> {
        prop_oneof![
            Just(FeeModel::None),
            (0u32..2000).prop_map(|c| FeeModel::Flat { per_trade: Decimal::new(c as i64, 2) }),
            (0u32..100).prop_map(|b| FeeModel::BasisPoints { bps: Decimal::from(b) }),
            Just(FeeModel::default()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn cash_identity_holds(
            raw_weights in prop::collection::vec(1u32..1000, 1..30),
            raw_prices in prop::collection::vec(1u32..500_000, 30),
            budget_cents in 100_000i64..100_000_000_000,
            fee_model in arb_fee_model(),
            whole in any::<bool>(),
            before in any::<bool>(),
        ) {
            let total: u32 = raw_weights.iter().sum();
            let w: Vec<PortfolioWeight> = raw_weights
                .iter()
                .enumerate()
                .map(|(i, x)| PortfolioWeight { ticker: format!("T{}", i), weight: *x as f64 / total as f64 })
                .collect();
            let p: HashMap<String, Decimal> = raw_prices
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("T{}", i), Decimal::new(*c as i64, 2)))
                .collect();
            let mode = if whole { ShareMode::Whole } else { ShareMode::Fractional };
            let timing = if before { FeeTiming::BeforeAllocation } else { FeeTiming::WithinPosition };
            let a = allocate(&w, &p, Decimal::new(budget_cents, 2), &policy(mode, fee_model, timing)).unwrap();

            prop_assert_eq!(a.total_invested + a.leftover_cash + a.total_fees, a.budget);
            prop_assert!(a.leftover_cash >= Decimal::ZERO);
            prop_assert_eq!(a.positions.len(), w.len());
        }
    }
}
