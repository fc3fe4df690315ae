use serde::{Deserialize, Serialize};

use super::{predominant, summarize, RegimeLabel, RegimeSummary, SimpleRegime};

/// Per-bar regime labels for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeContext {
    labels: Vec<RegimeLabel>,
}

impl RegimeContext {
    pub fn new(labels: Vec<RegimeLabel>) -> Self {
        Self { labels }
    }

    /// Build from raw, possibly missing label strings.
    pub fn from_raw<'a>(raw: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self::new(raw.into_iter().map(RegimeLabel::normalize).collect())
    }

    pub fn labels(&self) -> &[RegimeLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn summary(&self) -> RegimeSummary {
        summarize(&self.labels)
    }

    pub fn predominant(&self, trending_threshold: f64) -> SimpleRegime {
        predominant(&self.summary(), trending_threshold)
    }

    /// `true` for every bar whose label simplifies to `regime`.
    pub fn mask(&self, regime: SimpleRegime) -> Vec<bool> {
        self.labels.iter().map(|l| l.simple() == regime).collect()
    }

    pub fn bar_count(&self, regime: SimpleRegime) -> usize {
        self.labels.iter().filter(|l| l.simple() == regime).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_partition_known_bars() {
        let ctx = RegimeContext::from_raw([
            Some("trending_up"),
            Some("ranging"),
            None,
            Some("breakdown"),
        ]);
        assert_eq!(ctx.mask(SimpleRegime::Trending), vec![true, false, false, true]);
        assert_eq!(ctx.mask(SimpleRegime::Ranging), vec![false, true, false, false]);
        assert_eq!(ctx.bar_count(SimpleRegime::Unknown), 1);
    }

    #[test]
    fn predominant_of_context() {
        let ctx = RegimeContext::new(vec![
            RegimeLabel::TrendingUp,
            RegimeLabel::TrendingDown,
            RegimeLabel::Ranging,
        ]);
        assert_eq!(ctx.predominant(50.0), SimpleRegime::Trending);
        assert_eq!(ctx.predominant(70.0), SimpleRegime::Ranging);
    }
}
