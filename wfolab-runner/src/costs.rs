//! Cost model — slippage and commission per fill.
//!
//! Slippage is directional: buys fill higher, sells fill lower.
//! Commission is symmetric per side in basis points.

use serde::{Deserialize, Serialize};

/// Which way a fill moves inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Slippage in basis points, applied against the trader.
    pub slippage_bps: f64,
    /// Commission in basis points of notional, per fill.
    pub commission_bps: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(2.0, 2.0)
    }
}

impl CostModel {
    pub fn new(slippage_bps: f64, commission_bps: f64) -> Self {
        Self {
            slippage_bps,
            commission_bps,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Raw price moved against the trader by the slippage.
    pub fn fill_price(&self, raw_price: f64, side: FillSide) -> f64 {
        let slip = self.slippage_bps / 10_000.0;
        match side {
            FillSide::Buy => raw_price * (1.0 + slip),
            FillSide::Sell => raw_price * (1.0 - slip),
        }
    }

    /// Commission as a fraction of notional for one fill.
    pub fn commission_fraction(&self) -> f64 {
        self.commission_bps / 10_000.0
    }
}
