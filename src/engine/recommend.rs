//! Recommendation generation from the latest analytics window.
//!
//! A rolling advisory list, overwritten on each analytics pass.

use chrono::{DateTime, Utc};

use crate::domain::{
    Alert, AlertSeverity, Analytics, Recommendation, RecommendationPriority, RecommendedAction,
};

/// Utilization below this suggests the channel holds more rooms than it can
/// sell.
const LOW_UTILIZATION_PCT: f64 = 60.0;
/// Utilization above this suggests the channel is starved.
const HIGH_UTILIZATION_PCT: f64 = 90.0;
/// Conversion below this suggests the price point is off.
const LOW_CONVERSION_PCT: f64 = 20.0;

/// Derive advisory actions from the latest window. Highest priority first.
pub fn generate_recommendations(analytics: &Analytics) -> Vec<Recommendation> {
    let Some(window) = analytics.latest_window() else {
        return Vec::new();
    };

    let mut recommendations = Vec::new();
    for (channel_id, metrics) in &window.channels {
        if metrics.allocated == 0 {
            continue;
        }
        if metrics.utilization > HIGH_UTILIZATION_PCT {
            recommendations.push(Recommendation {
                action: RecommendedAction::IncreaseAllocation,
                channel_id: Some(*channel_id),
                priority: RecommendationPriority::High,
                confidence: 85,
                message: format!(
                    "{channel_id} utilization {:.1}% above {HIGH_UTILIZATION_PCT}%; allocate more rooms",
                    metrics.utilization
                ),
            });
        } else if metrics.utilization < LOW_UTILIZATION_PCT {
            recommendations.push(Recommendation {
                action: RecommendedAction::DecreaseAllocation,
                channel_id: Some(*channel_id),
                priority: RecommendationPriority::Medium,
                confidence: 75,
                message: format!(
                    "{channel_id} utilization {:.1}% below {LOW_UTILIZATION_PCT}%; free rooms for other channels",
                    metrics.utilization
                ),
            });
        }
        if metrics.conversion < LOW_CONVERSION_PCT {
            recommendations.push(Recommendation {
                action: RecommendedAction::AdjustRates,
                channel_id: Some(*channel_id),
                priority: RecommendationPriority::Medium,
                confidence: 70,
                message: format!(
                    "{channel_id} conversion {:.1}% below {LOW_CONVERSION_PCT}%; review the rate",
                    metrics.conversion
                ),
            });
        }
    }

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

/// Advisory alerts raised alongside recommendations.
pub fn generate_alerts(analytics: &Analytics, needs_sync: bool, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if needs_sync {
        alerts.push(Alert {
            severity: AlertSeverity::Warning,
            message: "channel-manager sync backlog; pushes exhausted retries".to_string(),
            raised_at: now,
        });
    }
    if let Some(window) = analytics.latest_window() {
        if window.overall.average_occupancy > 95.0 {
            alerts.push(Alert {
                severity: AlertSeverity::Info,
                message: format!(
                    "average occupancy {:.1}% near capacity",
                    window.overall.average_occupancy
                ),
                raised_at: now,
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalculationFrequency, ChannelId, ChannelMetrics, MetricsWindow, OverallMetrics};
    use std::collections::BTreeMap;

    fn analytics_with(metrics: &[(ChannelId, f64, f64)]) -> Analytics {
        let mut channels = BTreeMap::new();
        for (channel, utilization, conversion) in metrics {
            channels.insert(
                *channel,
                ChannelMetrics {
                    allocated: 100,
                    utilization: *utilization,
                    conversion: *conversion,
                    ..ChannelMetrics::default()
                },
            );
        }
        let mut analytics = Analytics::new(CalculationFrequency::Daily, Utc::now());
        analytics.windows.push(MetricsWindow {
            start: "2023-06-01".parse().unwrap(),
            end: "2023-06-30".parse().unwrap(),
            channels,
            overall: OverallMetrics::default(),
        });
        analytics
    }

    #[test]
    fn thresholds_map_to_actions() {
        let analytics = analytics_with(&[
            (ChannelId::Direct, 95.0, 95.0),
            (ChannelId::Expedia, 40.0, 15.0),
        ]);
        let recs = generate_recommendations(&analytics);

        assert!(recs.iter().any(|r| r.channel_id == Some(ChannelId::Direct)
            && r.action == RecommendedAction::IncreaseAllocation
            && r.priority == RecommendationPriority::High
            && r.confidence == 85));
        assert!(recs.iter().any(|r| r.channel_id == Some(ChannelId::Expedia)
            && r.action == RecommendedAction::DecreaseAllocation
            && r.confidence == 75));
        assert!(recs.iter().any(|r| r.channel_id == Some(ChannelId::Expedia)
            && r.action == RecommendedAction::AdjustRates
            && r.confidence == 70));

        // High priority sorts first.
        assert_eq!(recs[0].priority, RecommendationPriority::High);
    }

    #[test]
    fn healthy_channel_produces_nothing() {
        let analytics = analytics_with(&[(ChannelId::Direct, 75.0, 75.0)]);
        assert!(generate_recommendations(&analytics).is_empty());
    }

    #[test]
    fn no_window_means_no_recommendations() {
        let analytics = Analytics::new(CalculationFrequency::Daily, Utc::now());
        assert!(generate_recommendations(&analytics).is_empty());
    }
}
