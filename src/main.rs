use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Duration;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use smile_analytics::clock::{Clock, SystemClock};
use smile_analytics::db::PgSource;
use smile_analytics::engagement::engagement_for_activity;
use smile_analytics::insights::{insights_summary, TemplateInsights, TextInsightProvider};
use smile_analytics::llm::OpenAiInsights;
use smile_analytics::models::{GroupSnapshot, InsightsSummary};
use smile_analytics::source::{CsvSource, ObservationSource};
use smile_analytics::timing::{optimal_timing, TimingWeight};
use smile_analytics::{config, insights, performance, report, risk, telemetry};

#[derive(Parser)]
#[command(name = "smile-analytics")]
#[command(about = "Tier progression and learning analytics for SMILE", long_about = None)]
struct Cli {
    /// Read observations from a CSV export instead of Postgres
    #[arg(long, global = true, env = "SMILE_CSV")]
    csv: Option<PathBuf>,
    /// Postgres connection string
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    /// TOML file with a custom tier ladder
    #[arg(long, global = true, env = "SMILE_TIERS_PATH")]
    tiers: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a point total into a tier
    Tier {
        #[arg(long, allow_negative_numbers = true)]
        points: i64,
    },
    /// Predict a student's question quality trend
    Predict {
        #[arg(long)]
        student: String,
    },
    /// Project question activity for an activity
    Engagement {
        #[arg(long)]
        activity: String,
    },
    /// List students at risk of disengaging
    AtRisk {
        #[arg(long)]
        group: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Rank a user's busiest day/hour slots
    Timing {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value_t = TimingWeight::Uniform)]
        weighting: TimingWeight,
    },
    /// Summarize the health of a teacher's groups
    Insights {
        #[arg(long)]
        teacher: String,
    },
    /// Print a markdown digest for a teacher
    Report {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        group: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_source(cli: &Cli) -> anyhow::Result<Box<dyn ObservationSource>> {
    if let Some(path) = &cli.csv {
        let source = CsvSource::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        return Ok(Box::new(source));
    }
    match &cli.database_url {
        Some(url) => {
            let source = PgSource::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            Ok(Box::new(source))
        }
        None => bail!("either --csv or DATABASE_URL must be set"),
    }
}

fn insight_provider() -> Box<dyn TextInsightProvider> {
    match OpenAiInsights::from_env() {
        Some(provider) => {
            info!(
                base_url = %provider.base_url,
                model = %provider.model,
                "model-phrased insights enabled"
            );
            Box::new(provider)
        }
        None => {
            info!("OPENAI_API_KEY not set; using template insights");
            Box::new(TemplateInsights)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let clock = SystemClock;

    match &cli.command {
        Commands::Tier { points } => {
            let table = config::load_tier_table(cli.tiers.as_deref())
                .context("failed to load tier ladder")?;
            print_json(&table.classify(*points))?;
        }
        Commands::Predict { student } => {
            let source = open_source(&cli).await?;
            let observations = source.student_observations(student).await?;
            let prediction = performance::predict_performance(student, &observations, &clock);
            if prediction.is_none() {
                info!(%student, "insufficient data for a prediction");
            }
            print_json(&prediction)?;
        }
        Commands::Engagement { activity } => {
            let source = open_source(&cli).await?;
            let prediction = engagement_for_activity(source.as_ref(), activity, &clock).await?;
            if prediction.is_none() {
                info!(%activity, "activity not found");
            }
            print_json(&prediction)?;
        }
        Commands::AtRisk { group, limit } => {
            let source = open_source(&cli).await?;
            let students = source.students(group.as_deref()).await?;
            let mut flagged = risk::score_at_risk(&students, group.as_deref(), &clock);
            flagged.truncate(*limit);
            print_json(&flagged)?;
        }
        Commands::Timing { user, weighting } => {
            let source = open_source(&cli).await?;
            let observations = source.student_observations(user).await?;
            print_json(&optimal_timing(&observations, *weighting))?;
        }
        Commands::Insights { teacher } => {
            let source = open_source(&cli).await?;
            let summary = match owned_snapshot(source.as_ref(), teacher, &clock).await? {
                Some(snapshot) => summarize(&snapshot, &clock).await,
                None => None,
            };
            print_json(&summary)?;
        }
        Commands::Report {
            teacher,
            group,
            limit,
        } => {
            let source = open_source(&cli).await?;
            let snapshot = owned_snapshot(source.as_ref(), teacher, &clock).await?;
            let summary = match &snapshot {
                Some(snapshot) => summarize(snapshot, &clock).await,
                None => None,
            };
            let owned = snapshot
                .as_ref()
                .map(|snapshot| snapshot.group_ids.as_slice())
                .unwrap_or_default();
            let students = source.students(group.as_deref()).await?;
            let flagged = risk::score_owned_at_risk(&students, owned, group.as_deref(), &clock);
            print!(
                "{}",
                report::build_report(teacher, summary.as_ref(), &flagged, *limit)
            );
        }
    }

    Ok(())
}

async fn owned_snapshot(
    source: &dyn ObservationSource,
    teacher: &str,
    clock: &dyn Clock,
) -> anyhow::Result<Option<GroupSnapshot>> {
    let since = clock.now() - Duration::days(insights::QUALITY_WINDOW_DAYS);
    let snapshot = source.owned_groups(teacher, since).await?;
    if snapshot.is_none() {
        info!(%teacher, "teacher owns no groups");
    }
    Ok(snapshot)
}

async fn summarize(snapshot: &GroupSnapshot, clock: &dyn Clock) -> Option<InsightsSummary> {
    let provider = insight_provider();
    insights_summary(snapshot, clock, provider.as_ref()).await
}
