use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campus_pulse::config::Config;
use campus_pulse::dashboard::{self, Viewer};
use campus_pulse::db::{self, ImportKind, PgRecordStore, PgWatermarkStore};
use campus_pulse::models::Role;
use campus_pulse::notifications::{self, FreshnessTracker, WatermarkKey};
use campus_pulse::poller::{self, Scheduler};
use campus_pulse::report::{self, ReportInput};
use campus_pulse::store::{RecordStore, Scope};
use campus_pulse::{assignments, attendance, insights, marks};

#[derive(Parser)]
#[command(name = "campus-pulse")]
#[command(about = "Attendance, marks and notice metrics for the academic portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Student,
    Staff,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Student => Role::Student,
            RoleArg::Staff => Role::Staff,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportArg {
    Attendance,
    Marks,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance or mark rows from a CSV file
    Import {
        #[arg(long, value_enum)]
        kind: ImportArg,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print attendance, marks, assignment progress and insights
    #[command(group(
        ArgGroup::new("scope")
            .args(["student", "cohort"])
            .required(true)
            .multiple(false)
    ))]
    Summary {
        #[arg(long)]
        student: Option<i64>,
        #[arg(long)]
        cohort: bool,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Print the dashboard snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show unread notices for a user
    Notices {
        #[arg(long)]
        user: Option<String>,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        json: bool,
    },
    /// Acknowledge all current notices for a user
    MarkSeen {
        #[arg(long)]
        user: Option<String>,
    },
    /// Generate a markdown progress report for one student
    Report {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 90)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Keep the dashboard and notice badge refreshed until interrupted
    Watch {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, value_enum, default_value = "student")]
        role: RoleArg,
    },
}

fn watermark_key(user: Option<&str>) -> WatermarkKey {
    match user {
        Some(id) => WatermarkKey::for_user(id),
        None => WatermarkKey::installation(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = config.require_database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = Arc::new(PgRecordStore::new(pool.clone()));
    let watermarks = Arc::new(PgWatermarkStore::new(pool.clone()));
    let tracker_for = |user: Option<&str>| {
        FreshnessTracker::new(watermarks.clone(), watermark_key(user))
            .with_backlog_days(config.backlog_days)
    };

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { kind, csv } => {
            let kind = match kind {
                ImportArg::Attendance => ImportKind::Attendance,
                ImportArg::Marks => ImportKind::Marks,
            };
            let inserted = db::import_csv(&pool, kind, &csv).await?;
            println!("Inserted {inserted} rows from {}.", csv.display());
        }
        Commands::Summary {
            student,
            cohort: _,
            limit,
            json,
        } => {
            let scope = student.map(Scope::Student).unwrap_or(Scope::Cohort);
            let viewer = Viewer {
                scope,
                role: Role::Staff,
            };
            let snapshot = dashboard::refresh_dashboard(store.as_ref(), viewer).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }
            if snapshot.degraded {
                println!("Warning: some records could not be fetched; figures may be incomplete.");
            }

            let att = &snapshot.attendance;
            println!(
                "Attendance: {:.0}% ({}/{} days, {:?})",
                att.percentage,
                att.present,
                att.total,
                attendance::standing(att.percentage)
            );
            println!("Marks: {:.1}% overall", snapshot.marks.overall_percentage);
            for subject in &snapshot.marks.subjects {
                println!(
                    "- {} {:.1}% {}",
                    subject.subject,
                    subject.percentage,
                    subject.grade.label()
                );
            }

            if let Scope::Student(_) = scope {
                let progress = snapshot.assignments;
                println!(
                    "Assignments: {} completed, {} pending",
                    progress.completed, progress.pending
                );
            } else {
                let mark_rows = store.fetch_marks(Scope::Cohort).await?;
                println!(
                    "Class average: {:.0}%",
                    marks::class_average(&snapshot.marks.subjects)
                );
                println!("Top performers:");
                for standing in marks::top_performers(&mark_rows, limit) {
                    println!(
                        "- student {} {:.1}% {}",
                        standing.student_id,
                        standing.percentage,
                        standing.grade.label()
                    );
                }
                println!("Needs support:");
                for standing in marks::low_performers(&mark_rows, limit) {
                    println!(
                        "- student {} {:.1}% {}",
                        standing.student_id,
                        standing.percentage,
                        standing.grade.label()
                    );
                }
            }

            for insight in &snapshot.insights {
                println!("[{:?}] {}", insight.severity, insight.text);
            }
        }
        Commands::Notices { user, role, json } => {
            let tracker = tracker_for(user.as_deref());
            let snapshot = dashboard::refresh_notices(store.as_ref(), &tracker, role.into()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }
            match snapshot.badge {
                Some(badge) => println!("{badge} unread"),
                None => println!("No unread notices."),
            }
            for notice in &snapshot.recent {
                println!(
                    "- {} [{:?}] {}: {}",
                    notice.timestamp.format("%Y-%m-%d %H:%M"),
                    notice.priority,
                    notice.title,
                    notice.message
                );
            }
        }
        Commands::MarkSeen { user } => {
            let tracker = tracker_for(user.as_deref());
            let watermark = tracker.mark_seen().await?;
            println!("Notices seen up to {}.", watermark.format("%Y-%m-%dT%H:%M:%S"));
        }
        Commands::Report {
            student,
            user,
            since_days,
            out,
        } => {
            let since = Utc::now().date_naive() - Duration::days(since_days.max(1));
            let scope = Scope::Student(student);
            let attendance_rows = store.fetch_attendance_since(scope, since).await?;
            let mark_rows = store.fetch_marks(scope).await?;
            let bundle = store.fetch_tasks_and_submissions(scope).await?;
            let notices = store.fetch_notices(Role::Student).await?;

            let attendance = attendance::summarize(&attendance_rows);
            let marks = marks::summarize(&mark_rows);
            let progress = assignments::progress(&bundle.tasks, &bundle.submissions, student);
            let grade_stats = assignments::subject_grade_stats(&bundle.tasks, &bundle.submissions);
            let insights = insights::generate(&marks, &attendance, &progress);
            let unread = tracker_for(user.as_deref())
                .unread_count(&notices, Role::Student)
                .await?;
            let recent = notifications::recent(&notices, Role::Student, dashboard::RECENT_NOTICE_LIMIT);

            let label = format!("student {student}");
            let report = report::build_report(&ReportInput {
                student_label: &label,
                since,
                attendance: &attendance,
                marks: &marks,
                assignments: &progress,
                grade_stats: &grade_stats,
                unread,
                recent_notices: &recent,
                insights: &insights,
            });
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch {
            student,
            user,
            role,
        } => {
            let viewer = Viewer {
                scope: Scope::Student(student),
                role: role.into(),
            };
            let tracker = Arc::new(tracker_for(user.as_deref()));
            let records: Arc<dyn RecordStore> = store.clone();

            let (attendance_handle, mut attendance_rx) = poller::watch_attendance(
                &Scheduler::new("attendance"),
                config.poll.attendance,
                records.clone(),
                viewer.scope,
            );
            let (dashboard_handle, mut dashboard_rx) = poller::watch_dashboard(
                &Scheduler::new("dashboard"),
                config.poll.dashboard,
                records.clone(),
                viewer,
            );
            let (notice_handle, mut notice_rx) = poller::watch_notices(
                &Scheduler::new("notices"),
                config.poll.dashboard,
                records,
                tracker,
                viewer,
            );

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = attendance_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(summary) = attendance_rx.borrow_and_update().as_ref() {
                            println!("attendance {:.0}% ({}/{} days)", summary.percentage, summary.present, summary.total);
                        }
                    }
                    changed = dashboard_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(snapshot) = dashboard_rx.borrow_and_update().as_ref() {
                            println!(
                                "marks {:.1}% | pending {}{}",
                                snapshot.marks.overall_percentage,
                                snapshot.assignments.pending,
                                if snapshot.degraded { " (offline)" } else { "" }
                            );
                        }
                    }
                    changed = notice_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(snapshot) = notice_rx.borrow_and_update().as_ref() {
                            println!("notices: {} unread", snapshot.unread);
                        }
                    }
                }
            }

            attendance_handle.cancel();
            dashboard_handle.cancel();
            notice_handle.cancel();
            println!("Stopped.");
        }
    }

    Ok(())
}
