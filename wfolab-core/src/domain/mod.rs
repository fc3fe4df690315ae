//! Domain types for wfolab

pub mod bar;
pub mod position;

pub use bar::{Bar, SeriesError, TimeSeries, ZoneFlags};
pub use position::{OpenPosition, PositionSide};
