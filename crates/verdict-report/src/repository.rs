//! Filesystem persistence for generation reports.
//!
//! Reports live under `<base_dir>/<project_id>/<run_id>.json` as pretty
//! JSON. Saving the same run id again overwrites in place.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use verdict_types::Result;

use crate::GenerationReport;

/// Cross-run statistics computed over every stored report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_runs: usize,
    /// Fraction of runs whose report-level `passed` flag is set.
    pub success_rate: f64,
    pub average_score: f64,
    pub average_retries: f64,
    /// Overall-grade letter mapped to run count.
    pub grade_distribution: HashMap<String, usize>,
    /// Phases ranked by how many runs they failed in, worst first.
    pub top_failing_phases: Vec<PhaseFailureCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseFailureCount {
    pub phase_id: String,
    pub failures: usize,
}

/// Stores and retrieves [`GenerationReport`]s on disk.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    base_dir: PathBuf,
}

impl ReportRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.base_dir.join(project_id)
    }

    fn report_path(&self, project_id: &str, run_id: &str) -> PathBuf {
        self.project_dir(project_id).join(format!("{run_id}.json"))
    }

    /// Persist a report, creating the project directory on first save and
    /// overwriting any earlier file for the same run id.
    pub fn save(&self, report: &GenerationReport) -> Result<PathBuf> {
        let dir = self.project_dir(&report.project_id);
        fs::create_dir_all(&dir)?;
        let path = self.report_path(&report.project_id, &report.run_id);
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)?;
        tracing::info!(path = %path.display(), run = %report.run_id, "report saved");
        Ok(path)
    }

    /// Load one report, or `None` when that run was never saved.
    pub fn get(&self, project_id: &str, run_id: &str) -> Result<Option<GenerationReport>> {
        let path = self.report_path(project_id, run_id);
        if !path.exists() {
            return Ok(None);
        }
        let report = Self::read_report(&path)?;
        Ok(Some(report))
    }

    /// All reports for a project, most recent first, truncated to `limit`
    /// when given.
    pub fn list(&self, project_id: &str, limit: Option<usize>) -> Result<Vec<GenerationReport>> {
        let dir = self.project_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut reports = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read_report(&path) {
                    Ok(report) => reports.push(report),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "skipping unreadable report");
                    }
                }
            }
        }
        reports.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        if let Some(limit) = limit {
            reports.truncate(limit);
        }
        Ok(reports)
    }

    /// Scan every project and fold all stored reports into cross-run stats.
    /// Zeroed stats when nothing has been saved yet.
    pub fn get_aggregate(&self) -> Result<AggregateStats> {
        let mut reports = Vec::new();
        if self.base_dir.exists() {
            for entry in fs::read_dir(&self.base_dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    if let Some(project_id) = path.file_name().and_then(|n| n.to_str()) {
                        reports.extend(self.list(project_id, None)?);
                    }
                }
            }
        }
        Ok(Self::aggregate(&reports))
    }

    fn aggregate(reports: &[GenerationReport]) -> AggregateStats {
        let total_runs = reports.len();
        if total_runs == 0 {
            return AggregateStats::default();
        }

        let successes = reports.iter().filter(|r| r.passed).count();
        let average_score =
            reports.iter().map(|r| r.overall_score).sum::<f64>() / total_runs as f64;
        let average_retries = reports
            .iter()
            .map(|r| r.summary.retry_stats.total_retries as f64)
            .sum::<f64>()
            / total_runs as f64;

        let mut grade_distribution: HashMap<String, usize> = HashMap::new();
        let mut phase_failures: HashMap<String, usize> = HashMap::new();
        for report in reports {
            *grade_distribution
                .entry(report.overall_grade.to_string())
                .or_default() += 1;
            for phase in &report.phases {
                if !phase.passed {
                    *phase_failures.entry(phase.phase_id.clone()).or_default() += 1;
                }
            }
        }

        let mut top_failing_phases: Vec<PhaseFailureCount> = phase_failures
            .into_iter()
            .map(|(phase_id, failures)| PhaseFailureCount { phase_id, failures })
            .collect();
        top_failing_phases.sort_by(|a, b| {
            b.failures
                .cmp(&a.failures)
                .then_with(|| a.phase_id.cmp(&b.phase_id))
        });

        AggregateStats {
            total_runs,
            success_rate: successes as f64 / total_runs as f64,
            average_score,
            average_retries,
            grade_distribution,
            top_failing_phases,
        }
    }

    fn read_report(path: &Path) -> Result<GenerationReport> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
