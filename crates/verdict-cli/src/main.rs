//! CLI binary for inspecting stored generation reports.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use verdict_report::ReportRepository;

#[derive(Parser)]
#[command(name = "verdict", version, about = "Quality-gate reports for generation runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect stored generation reports
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
}

#[derive(Subcommand)]
enum ReportsCommands {
    /// List reports for a project, most recent first
    List {
        /// Reports base directory
        #[arg(short, long, default_value = ".verdict/reports")]
        dir: PathBuf,

        /// Project id
        #[arg(short, long)]
        project: String,

        /// Show at most this many reports
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one report as JSON
    Show {
        /// Reports base directory
        #[arg(short, long, default_value = ".verdict/reports")]
        dir: PathBuf,

        /// Project id
        #[arg(short, long)]
        project: String,

        /// Run id
        #[arg(short, long)]
        run: String,
    },

    /// Cross-run statistics over every stored report
    Aggregate {
        /// Reports base directory
        #[arg(short, long, default_value = ".verdict/reports")]
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Reports { command } => match command {
            ReportsCommands::List {
                dir,
                project,
                limit,
            } => cmd_list(&dir, &project, limit)?,
            ReportsCommands::Show { dir, project, run } => cmd_show(&dir, &project, &run)?,
            ReportsCommands::Aggregate { dir } => cmd_aggregate(&dir)?,
        },
    }

    Ok(())
}

fn cmd_list(dir: &std::path::Path, project: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let repo = ReportRepository::new(dir);
    let reports = repo.list(project, limit)?;

    if reports.is_empty() {
        println!("No reports for project '{project}'");
        return Ok(());
    }

    for report in &reports {
        let status = if report.passed { "PASS" } else { "FAIL" };
        println!(
            "{}  {}  {:>5.1}  {}  {} ({} phases, {} retries)",
            report.generated_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            report.overall_score,
            report.overall_grade,
            report.run_id,
            report.phases.len(),
            report.summary.retry_stats.total_retries,
        );
    }
    Ok(())
}

fn cmd_show(dir: &std::path::Path, project: &str, run: &str) -> anyhow::Result<()> {
    let repo = ReportRepository::new(dir);
    match repo.get(project, run)? {
        Some(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        None => {
            eprintln!("No report for project '{project}' run '{run}'");
            std::process::exit(1);
        }
    }
}

fn cmd_aggregate(dir: &std::path::Path) -> anyhow::Result<()> {
    let repo = ReportRepository::new(dir);
    let stats = repo.get_aggregate()?;

    if stats.total_runs == 0 {
        println!("No reports stored under {}", dir.display());
        return Ok(());
    }

    println!("Runs: {}", stats.total_runs);
    println!("Success rate: {:.1}%", stats.success_rate * 100.0);
    println!("Average score: {:.1}", stats.average_score);
    println!("Average retries: {:.1}", stats.average_retries);

    let mut grades: Vec<_> = stats.grade_distribution.iter().collect();
    grades.sort_by(|a, b| a.0.cmp(b.0));
    println!("\nGrades:");
    for (grade, count) in grades {
        println!("  {grade}: {count}");
    }

    if !stats.top_failing_phases.is_empty() {
        println!("\nTop failing phases:");
        for entry in &stats.top_failing_phases {
            println!("  {}: {} failed runs", entry.phase_id, entry.failures);
        }
    }
    Ok(())
}
