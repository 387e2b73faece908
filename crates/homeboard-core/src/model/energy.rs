// ── Energy usage samples ──

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergySample {
    pub recorded_at: DateTime<Utc>,
    pub usage_kwh: f64,
    pub solar_generation_kwh: f64,
    pub cost_usd: Option<f64>,
}

impl EnergySample {
    /// Usage minus generation. Negative means exporting.
    pub fn net_kwh(&self) -> f64 {
        self.usage_kwh - self.solar_generation_kwh
    }
}

/// Totals over a window of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergySummary {
    pub samples: usize,
    pub usage_kwh: f64,
    pub solar_generation_kwh: f64,
    pub cost_usd: f64,
}

impl EnergySummary {
    pub fn from_samples(samples: &[EnergySample]) -> Self {
        samples.iter().fold(Self::default(), |mut acc, s| {
            acc.samples += 1;
            acc.usage_kwh += s.usage_kwh;
            acc.solar_generation_kwh += s.solar_generation_kwh;
            acc.cost_usd += s.cost_usd.unwrap_or(0.0);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_treats_missing_cost_as_zero() {
        let at = Utc::now();
        let samples = [
            EnergySample {
                recorded_at: at,
                usage_kwh: 1.5,
                solar_generation_kwh: 2.0,
                cost_usd: Some(0.3),
            },
            EnergySample {
                recorded_at: at,
                usage_kwh: 0.5,
                solar_generation_kwh: 0.0,
                cost_usd: None,
            },
        ];
        let sum = EnergySummary::from_samples(&samples);
        assert_eq!(sum.samples, 2);
        assert!((sum.usage_kwh - 2.0).abs() < f64::EPSILON);
        assert!((sum.cost_usd - 0.3).abs() < f64::EPSILON);
        assert!(samples[0].net_kwh() < 0.0);
    }
}
