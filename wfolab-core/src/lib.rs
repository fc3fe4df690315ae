//! wfolab core — domain types, feature producers, regime classification and
//! the strictness-ladder signal generator.
//!
//! This crate is pure computation over in-memory series:
//! - Validated OHLCV series with optional support/resistance zone flags
//! - Indicator producers and the per-window FeatureFrame
//! - Parameter sets, their typed strategy view and cross-product grids
//! - Per-bar regime labels, summaries and regime-driven parameter adaptation
//! - Entry/exit signals on an ordered strictness ladder with escalation
//!
//! Backtesting, search and walk-forward orchestration live in `wfolab-runner`.

pub mod domain;
pub mod features;
pub mod indicators;
pub mod params;
pub mod regime;
pub mod signal;
pub mod synthetic;

pub use domain::{Bar, SeriesError, TimeSeries, ZoneFlags};
pub use features::{Feature, FeatureFrame, FeatureSpec};
pub use params::{ParamError, ParamGrid, ParamValue, ParameterSet, StrategyParams};
pub use regime::{RegimeContext, RegimeLabel, SimpleRegime};
pub use signal::{SignalError, SignalSet, Strictness};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared with search workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<TimeSeries>();
        require_sync::<TimeSeries>();
        require_send::<FeatureFrame>();
        require_sync::<FeatureFrame>();
        require_send::<ParameterSet>();
        require_sync::<ParameterSet>();
        require_send::<StrategyParams>();
        require_sync::<StrategyParams>();
        require_send::<RegimeContext>();
        require_sync::<RegimeContext>();
        require_send::<SignalSet>();
        require_sync::<SignalSet>();
        require_send::<regime::RegimeClassifier>();
        require_sync::<regime::RegimeClassifier>();
    }

    /// Signals are a function of features and parameters only.
    #[test]
    fn signal_generation_takes_no_position_state() {
        fn _check(
            frame: &FeatureFrame,
            params: &StrategyParams,
        ) -> Result<SignalSet, SignalError> {
            signal::generate(frame, params)
        }
    }
}
