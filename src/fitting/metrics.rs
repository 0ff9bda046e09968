//! Goodness-of-fit statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Channel;

/// Fit quality for one measured channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    /// Number of measurements
    pub n: usize,

    /// Sum of squared residuals
    pub ssr: f64,

    /// Root mean squared residual
    pub rmse: f64,

    /// Coefficient of determination. `None` when the measurements have no
    /// variance, where R² is undefined.
    pub r_squared: Option<f64>,
}

/// Fit quality over all channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub channels: BTreeMap<Channel, ChannelMetrics>,

    /// Total sum of squared residuals
    pub ssr: f64,

    /// Pooled R²: one minus total SSR over the summed per-channel variance
    /// sums. `None` if every channel is constant.
    pub r_squared: Option<f64>,
}

/// Accumulates `(channel, measured, simulated)` triples.
#[derive(Debug, Default)]
pub(crate) struct MetricsBuilder {
    pairs: BTreeMap<Channel, Vec<(f64, f64)>>,
}

impl MetricsBuilder {
    pub fn push(&mut self, channel: Channel, measured: f64, simulated: f64) {
        self.pairs
            .entry(channel)
            .or_default()
            .push((measured, simulated));
    }

    pub fn finish(self) -> FitMetrics {
        let mut channels = BTreeMap::new();
        let mut ssr_total = 0.0;
        let mut sst_total = 0.0;

        for (channel, pairs) in self.pairs {
            let n = pairs.len();
            let mean = pairs.iter().map(|(m, _)| m).sum::<f64>() / n as f64;
            let ssr: f64 = pairs.iter().map(|(m, s)| (s - m).powi(2)).sum();
            // Compare values directly: a rounded mean leaves tiny nonzero
            // deviations for a constant channel.
            let constant = pairs.iter().all(|(m, _)| *m == pairs[0].0);
            let sst: f64 = if constant {
                0.0
            } else {
                pairs.iter().map(|(m, _)| (m - mean).powi(2)).sum()
            };

            ssr_total += ssr;
            sst_total += sst;

            channels.insert(
                channel,
                ChannelMetrics {
                    n,
                    ssr,
                    rmse: (ssr / n as f64).sqrt(),
                    r_squared: r_squared(ssr, sst),
                },
            );
        }

        FitMetrics {
            channels,
            ssr: ssr_total,
            r_squared: r_squared(ssr_total, sst_total),
        }
    }
}

fn r_squared(ssr: f64, sst: f64) -> Option<f64> {
    (sst > 0.0).then(|| 1.0 - ssr / sst)
}
