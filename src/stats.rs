//! Distribution summaries for repeated-run samples

use serde::Serialize;

use crate::types::RepeatedRuns;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = pct.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Drop the upper tail above the given percentile
pub fn trim_above(values: &[f64], pct: f64) -> Vec<f64> {
    match percentile(values, pct) {
        Some(cutoff) => values.iter().copied().filter(|&v| v <= cutoff).collect(),
        None => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    pub fn from_samples(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let median = median(values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: values.len(),
            mean,
            median,
            min,
            max,
        })
    }
}

/// How many runs stopped at a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReach {
    pub name: String,
    pub count: usize,
    pub rate_pct: f64,
}

/// Raw and tail-trimmed summaries of a repeated run
#[derive(Debug, Clone, Serialize)]
pub struct RepeatedReport {
    pub runs: usize,
    pub trim_percentile: f64,
    pub profit: Summary,
    pub trimmed_profit: Summary,
    pub days: Summary,
    pub trimmed_days: Summary,
    pub stages: Vec<StageReach>,
}

impl RepeatedReport {
    /// Returns None when there are no runs to summarize
    pub fn from_runs(runs: &RepeatedRuns, stage_names: &[String], trim_percentile: f64) -> Option<Self> {
        let total = runs.runs();
        let days: Vec<f64> = runs.total_days.iter().map(|&d| d as f64).collect();

        let profit = Summary::from_samples(&runs.combined_results)?;
        let trimmed_profit = Summary::from_samples(&trim_above(&runs.combined_results, trim_percentile))?;
        let day_summary = Summary::from_samples(&days)?;
        let trimmed_days = Summary::from_samples(&trim_above(&days, trim_percentile))?;

        let stages = stage_names
            .iter()
            .zip(runs.stage_reached.iter())
            .map(|(name, &count)| StageReach {
                name: name.clone(),
                count,
                rate_pct: count as f64 / total as f64 * 100.0,
            })
            .collect();

        Some(Self {
            runs: total,
            trim_percentile,
            profit,
            trimmed_profit,
            days: day_summary,
            trimmed_days,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 50.0), Some(2.5));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));

        let hundred: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let p97 = percentile(&hundred, 97.0).unwrap();
        assert!((p97 - 97.03).abs() < 1e-9);
    }

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
    }

    #[test]
    fn test_trim_above_drops_upper_tail() {
        let mut values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        values.push(10_000.0);

        let trimmed = trim_above(&values, 97.0);
        assert!(trimmed.len() < values.len());
        assert!(trimmed.iter().all(|&v| v <= 98.0));
        assert!(!trimmed.contains(&10_000.0));
    }

    #[test]
    fn test_report_rates() {
        let runs = RepeatedRuns {
            combined_results: vec![-39.0, -39.0, 120.0, 500.0],
            total_days: vec![5, 12, 40, 90],
            stopped_at: vec![0, 0, 1, 2],
            stage_reached: vec![2, 1, 1],
        };
        let names = vec!["Phase 1".to_string(), "Phase 2".to_string(), "Funded".to_string()];

        let report = RepeatedReport::from_runs(&runs, &names, 97.0).unwrap();

        assert_eq!(report.runs, 4);
        assert_eq!(report.profit.count, 4);
        assert!((report.profit.mean - 135.5).abs() < 1e-9);
        assert!((report.profit.median - 40.5).abs() < 1e-9);
        assert_eq!(report.trimmed_profit.count, 3);
        assert_eq!(report.stages[0].count, 2);
        assert!((report.stages[0].rate_pct - 50.0).abs() < 1e-9);
        assert!((report.stages[2].rate_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_empty() {
        assert!(RepeatedReport::from_runs(&RepeatedRuns::default(), &[], 97.0).is_none());
    }
}
