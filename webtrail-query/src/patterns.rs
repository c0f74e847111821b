//! Navigation pattern mining.
//!
//! Turns per-tab navigation sequences into recurring domain n-grams
//! (length 2 to 4) scored by frequency with a 30-day recency boost.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MIN_WINDOW: usize = 2;
const MAX_WINDOW: usize = 4;
const RECENCY_HORIZON_DAYS: f64 = 30.0;

/// One visit inside a reconstructed navigation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub time_spent_ms: u64,
}

/// A recurring domain sequence with its aggregate stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowsingPattern {
    pub domains: Vec<String>,
    pub frequency: u64,
    pub avg_time_spent_ms: f64,
    pub last_occurrence: DateTime<Utc>,
    /// `frequency × (1 + max(0, 1 − ageInDays/30))` — recent patterns can
    /// score up to double their raw frequency.
    pub strength: f64,
}

struct PatternAccumulator {
    domains: Vec<String>,
    frequency: u64,
    total_time_spent_ms: u64,
    last_occurrence: DateTime<Utc>,
}

/// Mine sliding-window n-grams out of navigation sequences and return the
/// top `k` by strength.
pub fn mine_patterns(
    sequences: &[Vec<NavigationEvent>],
    k: usize,
    now: DateTime<Utc>,
) -> Vec<BrowsingPattern> {
    let mut accumulators: HashMap<String, PatternAccumulator> = HashMap::new();

    for sequence in sequences {
        for width in MIN_WINDOW..=MAX_WINDOW {
            if sequence.len() < width {
                break;
            }
            for window in sequence.windows(width) {
                let domains: Vec<String> = window.iter().map(|e| e.domain.clone()).collect();
                let key = domains.join(" -> ");
                let window_time: u64 = window.iter().map(|e| e.time_spent_ms).sum();
                let window_end = window
                    .iter()
                    .map(|e| e.timestamp)
                    .max()
                    .unwrap_or(now);

                let acc = accumulators.entry(key).or_insert(PatternAccumulator {
                    domains,
                    frequency: 0,
                    total_time_spent_ms: 0,
                    last_occurrence: window_end,
                });
                acc.frequency += 1;
                acc.total_time_spent_ms += window_time;
                if window_end > acc.last_occurrence {
                    acc.last_occurrence = window_end;
                }
            }
        }
    }

    let mut patterns: Vec<BrowsingPattern> = accumulators
        .into_values()
        .map(|acc| {
            let age_days = (now - acc.last_occurrence).num_seconds().max(0) as f64 / 86_400.0;
            let recency = (1.0 - age_days / RECENCY_HORIZON_DAYS).max(0.0);
            BrowsingPattern {
                strength: acc.frequency as f64 * (1.0 + recency),
                avg_time_spent_ms: acc.total_time_spent_ms as f64 / acc.frequency as f64,
                domains: acc.domains,
                frequency: acc.frequency,
                last_occurrence: acc.last_occurrence,
            }
        })
        .collect();

    patterns.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.frequency.cmp(&a.frequency))
    });
    patterns.truncate(k);
    patterns
}
