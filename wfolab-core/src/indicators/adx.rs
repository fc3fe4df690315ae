//! Directional movement system (Wilder): +DI, −DI and ADX.
//!
//! ADX measures trend strength regardless of direction; the DI lines give the
//! direction. ADX needs roughly `2 * period` bars before its first value.

use super::atr::{true_range, wilder_smooth};
use crate::domain::Bar;

/// Aligned +DI, −DI and ADX series.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalIndex {
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub adx: Vec<f64>,
}

/// Compute +DI, −DI and ADX in one pass over the bars.
pub fn directional_index(bars: &[Bar], period: usize) -> DirectionalIndex {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if !(up.is_finite() && down.is_finite()) {
            continue;
        }
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let mut tr = true_range(bars);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    let tr_s = wilder_smooth(&tr, period);
    let plus_s = wilder_smooth(&plus_dm, period);
    let minus_s = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if !(tr_s[i].is_finite() && plus_s[i].is_finite() && minus_s[i].is_finite()) {
            continue;
        }
        if tr_s[i] == 0.0 {
            plus_di[i] = 0.0;
            minus_di[i] = 0.0;
            dx[i] = 0.0;
            continue;
        }
        plus_di[i] = 100.0 * plus_s[i] / tr_s[i];
        minus_di[i] = 100.0 * minus_s[i] / tr_s[i];
        let sum = plus_di[i] + minus_di[i];
        dx[i] = if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di[i] - minus_di[i]).abs() / sum
        };
    }

    DirectionalIndex {
        plus_di,
        minus_di,
        adx: wilder_smooth(&dx, period),
    }
}
