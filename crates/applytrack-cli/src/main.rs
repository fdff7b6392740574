mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{Level, info, warn};

use applytrack_core::analytics::AnalyticsReport;
use applytrack_core::domain::RepositoryError;
use applytrack_core::impls::{
    InMemoryApplicationRepository, InMemoryKeyValueStore, InMemoryProfileSource,
    JsonFileKeyValueStore, PumpReport,
};
use applytrack_core::pipeline::{Board, PipelineStats};
use applytrack_core::ports::{ChangeEventType, ChangeNotification, KeyValueStore};
use applytrack_core::profile::{Experience, Profile, ProfileHeader, ProfileSnapshot, Skill};
use applytrack_core::schedule::{EntryKind, NewEntry, ScheduleEntry};
use applytrack_core::{
    ApplicationRecord, RecordId, SessionBuilder, SessionStatus, Stage, TrackerConfig, UserId,
};

struct Args {
    config: Option<PathBuf>,
    kv: Option<PathBuf>,
    verbose: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        kv: None,
        verbose: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            "--kv" => {
                let path = iter.next().ok_or("--kv needs a path")?;
                args.kv = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

#[derive(Serialize)]
struct Summary {
    board: Board,
    stats: PipelineStats,
    report: AnalyticsReport,
    header: ProfileHeader,
    upcoming: Vec<ScheduleEntry>,
    failures: Vec<String>,
    status: SessionStatus,
    change_feed: Option<PumpReport>,
}

fn seed_records(user: UserId) -> Vec<ApplicationRecord> {
    let start = Utc::now() - Duration::days(30);
    let rows = [
        (1, "Northwind", "Backend Engineer", Stage::Applied),
        (2, "Contoso", "Platform Engineer", Stage::Applied),
        (3, "Globex", "SRE", Stage::Applied),
        (42, "Initech", "Rust Developer", Stage::Applied),
        (5, "Umbrella", "Data Engineer", Stage::PhoneScreen),
        (6, "Hooli", "Staff Engineer", Stage::Rejected),
        (7, "Stark", "Tooling Engineer", Stage::Interested),
    ];
    rows.iter()
        .enumerate()
        .map(|(i, (id, company, position, stage))| {
            ApplicationRecord::new(
                RecordId::new(*id),
                user,
                *company,
                *position,
                *stage,
                start + Duration::hours(i as i64),
            )
        })
        .collect()
}

fn seed_profile(user: UserId) -> ProfileSnapshot {
    let skill = |name: &str, category: &str| Skill {
        name: name.into(),
        category: category.into(),
        years: None,
    };
    ProfileSnapshot {
        profile: Profile {
            user,
            full_name: "Alex Morgan".into(),
            headline: Some("Systems engineer".into()),
            location: Some("Remote".into()),
        },
        skills: vec![
            skill("Rust", "language"),
            skill("Go", "language"),
            skill("Postgres", "data"),
        ],
        experience: vec![Experience {
            company: "Acme".into(),
            title: "Senior Engineer".into(),
            started_on: NaiveDate::from_ymd_opt(2021, 4, 1).unwrap_or_default(),
            ended_on: None,
        }],
        education: Vec::new(),
        fetched_at: Utc::now(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;
    logging::init_logging(if args.verbose { Level::DEBUG } else { Level::INFO });

    let config = match &args.config {
        Some(path) => TrackerConfig::from_path(path)?,
        None => TrackerConfig::default(),
    };
    let kv: Arc<dyn KeyValueStore> = match &args.kv {
        Some(path) => Arc::new(JsonFileKeyValueStore::open(path)?),
        None => Arc::new(InMemoryKeyValueStore::new()),
    };

    let user = UserId::new(1);
    let repository = Arc::new(InMemoryApplicationRepository::with_records(seed_records(user)));
    let profiles = Arc::new(InMemoryProfileSource::new());
    profiles.put(seed_profile(user));

    let session = SessionBuilder::new()
        .user(user)
        .config(config)
        .repository(repository.clone())
        .profile_source(profiles)
        .key_value_store(kv)
        .with_change_feed()
        .build()?;
    session.refresh().await?;

    let mut failures = Vec::new();

    // optimistic move, confirmed
    let outcome = session.move_record(RecordId::new(42), Stage::Interview).await?;
    info!(tx = %outcome.tx_id, "record 42 moved to interview");

    // forced remote failure: rolled back, board unchanged
    repository.fail_next(RepositoryError::Timeout);
    if let Err(err) = session.move_record(RecordId::new(1), Stage::Offer).await {
        warn!(error = %err, "move rolled back");
        failures.push(err.to_string());
    }

    session
        .bulk_move(&[RecordId::new(2), RecordId::new(3)], Stage::PhoneScreen)
        .await?;

    session.schedule().add_entry(
        NewEntry::new(
            EntryKind::Interview,
            "Initech onsite",
            Utc::now() + Duration::days(2),
        )
        .for_record(RecordId::new(42)),
    )?;

    // a remote edit arrives through the change feed
    if let Some(feed) = session.change_feed() {
        feed.send(ChangeNotification::new("job_applications", ChangeEventType::Update, user))
            .await?;
        while !session.needs_refresh() {
            sleep(std::time::Duration::from_millis(5)).await;
        }
        session.refresh().await?;
    }

    let header = session.profile().header(user).await?;
    let upcoming = session
        .schedule()
        .upcoming(Utc::now(), Duration::days(7))?;

    let summary_status = session.status();
    let board = session.board();
    let stats = session.stats();
    let report = session.pipeline_report();
    let change_feed = session.end().await;

    let summary = Summary {
        board,
        stats,
        report,
        header,
        upcoming,
        failures,
        status: summary_status,
        change_feed,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
