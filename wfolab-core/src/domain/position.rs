use serde::{Deserialize, Serialize};

/// Which side of the book a signal or position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// An open position in the simplified ledger: one per side at most.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    pub entry_index: usize,
    /// Fill price after slippage.
    pub entry_price: f64,
}

impl OpenPosition {
    /// Gross return on the position if closed at `price`.
    pub fn unrealized_return(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.side.sign() * (price - self.entry_price) / self.entry_price
    }
}
