//! Health Report Aggregation
//!
//! Combines per-metric results into one weighted total.
//!
//! # Scoring Formula
//!
//! ```text
//! total     = Σ (score / max_score) × weight      (successful metrics only)
//! max_total = Σ weight                            (successful metrics only)
//! grade     = letter for total / max_total × 100
//! ```
//!
//! A metric with `max_score == 0` contributes nothing. Failed metrics are
//! listed separately and do not count against the total.

use crate::metrics::{HealthRun, MetricFailure, MetricResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One metric with its share of the total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedMetric {
    #[serde(flatten)]
    pub result: MetricResult,
    pub weight: f64,
    /// Points contributed to the total
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub root: PathBuf,
    pub total: f64,
    pub max_total: f64,
    pub grade: String,
    pub metrics: Vec<WeightedMetric>,
    pub failures: Vec<MetricFailure>,
}

impl HealthReport {
    /// Total as a percentage of `max_total`
    pub fn percent(&self) -> f64 {
        if self.max_total > 0.0 {
            self.total / self.max_total * 100.0
        } else {
            0.0
        }
    }
}

/// Letter grade for a 0-100 percentage
pub fn grade_for(percent: f64) -> &'static str {
    if percent >= 90.0 {
        "A"
    } else if percent >= 80.0 {
        "B"
    } else if percent >= 70.0 {
        "C"
    } else if percent >= 60.0 {
        "D"
    } else {
        "F"
    }
}

/// Weight and sum a registry run; result order follows the run
pub fn aggregate(root: PathBuf, run: HealthRun, weights: &BTreeMap<String, f64>) -> HealthReport {
    let mut total = 0.0;
    let mut max_total = 0.0;
    let mut metrics = Vec::with_capacity(run.results.len());

    for result in run.results {
        let weight = weights.get(&result.key).copied().unwrap_or(0.0).max(0.0);
        let points = if result.max_score > 0.0 {
            (result.score / result.max_score).clamp(0.0, 1.0) * weight
        } else {
            0.0
        };
        debug!("{}: {:.2}/{:.2} points", result.key, points, weight);
        total += points;
        max_total += weight;
        metrics.push(WeightedMetric {
            result,
            weight: round2(weight),
            points: round2(points),
        });
    }

    let total = round2(total.clamp(0.0, max_total));
    let max_total = round2(max_total);
    let mut report = HealthReport {
        root,
        total,
        max_total,
        grade: String::new(),
        metrics,
        failures: run.failures,
    };
    report.grade = grade_for(report.percent()).to_string();

    info!(
        "Health: {:.2}/{:.2} ({}), {} metrics, {} failed",
        report.total,
        report.max_total,
        report.grade,
        report.metrics.len(),
        report.failures.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(key: &str, score: f64, max_score: f64) -> MetricResult {
        MetricResult {
            key: key.into(),
            score,
            max_score,
            summary: String::new(),
            details: None,
        }
    }

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, w)| (k.to_string(), *w)).collect()
    }

    #[test]
    fn test_weighted_total() {
        let run = HealthRun {
            results: vec![result("a", 10.0, 10.0), result("b", 5.0, 10.0)],
            failures: vec![],
        };
        let report = aggregate(PathBuf::from("."), run, &weights(&[("a", 60.0), ("b", 40.0)]));
        assert_eq!(report.total, 80.0);
        assert_eq!(report.max_total, 100.0);
        assert_eq!(report.grade, "B");
        assert_eq!(report.metrics[1].points, 20.0);
    }

    #[test]
    fn test_zero_max_contributes_nothing() {
        let run = HealthRun {
            results: vec![result("a", 0.0, 0.0)],
            failures: vec![],
        };
        let report = aggregate(PathBuf::from("."), run, &weights(&[("a", 50.0)]));
        assert_eq!(report.total, 0.0);
        assert_eq!(report.grade, "F");
    }

    #[test]
    fn test_failures_excluded_from_max() {
        let run = HealthRun {
            results: vec![result("a", 9.5, 10.0)],
            failures: vec![MetricFailure {
                key: "b".into(),
                error: "boom".into(),
            }],
        };
        let report = aggregate(PathBuf::from("."), run, &weights(&[("a", 50.0), ("b", 50.0)]));
        assert_eq!(report.max_total, 50.0);
        assert_eq!(report.total, 47.5);
        assert_eq!(report.grade, "A");
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_total_stays_in_bounds() {
        let scores = [-5.0, 0.0, 3.3, 10.0, 12.0];
        for &score in &scores {
            for &weight in &[0.0, 7.5, 25.0] {
                let run = HealthRun {
                    results: vec![result("a", score, 10.0), result("b", 10.0 - score, 10.0)],
                    failures: vec![],
                };
                let w = weights(&[("a", weight), ("b", 100.0 - weight)]);
                let report = aggregate(PathBuf::from("."), run, &w);
                assert!(report.total >= 0.0);
                assert!(report.total <= w.values().sum::<f64>() + 1e-9);
            }
        }
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade_for(90.0), "A");
        assert_eq!(grade_for(89.99), "B");
        assert_eq!(grade_for(70.0), "C");
        assert_eq!(grade_for(60.0), "D");
        assert_eq!(grade_for(59.9), "F");
    }
}
