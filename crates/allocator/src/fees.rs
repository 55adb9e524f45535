use configuration::{FeeModel, ShareMode};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// How share quantities are quantised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lot {
    pub mode: ShareMode,
    /// Decimal places kept in fractional mode.
    pub decimals: u32,
}

impl Lot {
    /// Rounds `shares` towards zero onto the lot grid.
    pub fn quantize(&self, shares: Decimal) -> Decimal {
        if shares <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self.mode {
            ShareMode::Whole => shares.floor(),
            ShareMode::Fractional => shares.round_dp_with_strategy(self.decimals, RoundingStrategy::ToZero),
        }
    }

    /// The smallest tradable increment.
    pub fn step(&self) -> Decimal {
        match self.mode {
            ShareMode::Whole => Decimal::ONE,
            ShareMode::Fractional => Decimal::new(1, self.decimals),
        }
    }
}

/// Fee charged for buying `shares` worth `value`. Nothing is charged for an empty trade.
pub fn fee_for(model: &FeeModel, shares: Decimal, value: Decimal) -> Decimal {
    if shares <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    match model {
        FeeModel::None => Decimal::ZERO,
        FeeModel::Flat { per_trade } => *per_trade,
        FeeModel::BasisPoints { bps } => value * *bps / dec!(10000),
        FeeModel::PerShare { rate, max_per_trade } => {
            let fee = shares * *rate;
            match max_per_trade {
                Some(cap) => fee.min(*cap),
                None => fee,
            }
        }
    }
}

/// Largest quantity on the lot grid whose value plus fee fits within `target`.
pub fn shares_within(model: &FeeModel, target: Decimal, price: Decimal, lot: Lot) -> Decimal {
    if target <= Decimal::ZERO || price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let raw = match model {
        FeeModel::None => target / price,
        FeeModel::Flat { per_trade } => (target - *per_trade) / price,
        FeeModel::BasisPoints { bps } => target / (price * (Decimal::ONE + *bps / dec!(10000))),
        FeeModel::PerShare { rate, max_per_trade } => {
            let uncapped = target / (price + *rate);
            match max_per_trade {
                Some(cap) if uncapped * *rate > *cap => (target - *cap) / price,
                _ => uncapped,
            }
        }
    };

    let mut shares = lot.quantize(raw);
    // Division rounding can leave the last lot a hair over the target.
    while shares > Decimal::ZERO && shares * price + fee_for(model, shares, shares * price) > target {
        shares = lot.quantize(shares - lot.step());
    }
    shares
}
