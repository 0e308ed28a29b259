use serde::Serialize;

/// Samples considered by the trend primitive.
pub const TREND_SAMPLE_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Second-half mean minus first-half mean.
    pub change: f64,
}

/// Split-halves directionality over the most recent samples.
///
/// Takes the last [`TREND_SAMPLE_LIMIT`] samples, splits at floor(n/2)
/// (first half gets the smaller share), and compares arithmetic means.
/// Deliberately order-sensitive: this is recency-weighted directionality,
/// not a regression fit. Needs at least two points to have a direction.
pub fn compute_trend(samples: &[f64]) -> Option<Trend> {
    if samples.len() < 2 {
        return None;
    }
    let recent = &samples[samples.len().saturating_sub(TREND_SAMPLE_LIMIT)..];
    let (first, second) = recent.split_at(recent.len() / 2);
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let change = mean(second) - mean(first);
    let direction = if change > 0.0 {
        TrendDirection::Increasing
    } else if change < 0.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    Some(Trend { direction, change })
}
