use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use services::{AppConfig, AppServices, AuthError, Clock};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracker_core::calendar::month_grid;
use tracker_core::model::contest::on_day;
use tracker_core::model::{Difficulty, QuestionId, Topic, TopicId};
use tracker_core::stats::{
    ActivitySummary, DifficultyBreakdown, ProgressSummary, TopicProgress, TopicStatus,
};

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidMonth { raw: String },
    InvalidDay { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidMonth { raw } => write!(f, "invalid --month value (want YYYY-MM): {raw}"),
            ArgsError::InvalidDay { raw } => write!(f, "invalid --day value (want YYYY-MM-DD): {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug)]
enum CommandError {
    UnknownTopic(String),
    UnknownQuestion(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownTopic(id) => write!(f, "no topic with id {id}; try `topics`"),
            CommandError::UnknownQuestion(id) => write!(f, "no question with id {id}"),
        }
    }
}

impl std::error::Error for CommandError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_arg(
    args: &mut impl Iterator<Item = String>,
    what: &'static str,
) -> Result<String, ArgsError> {
    match args.next() {
        Some(arg) if !arg.starts_with("--") => Ok(arg),
        Some(arg) => Err(ArgsError::UnknownArg(arg)),
        None => Err(ArgsError::MissingArgument { what }),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  topics                                  list topics with progress");
    eprintln!("  topic <topic-id> [--filter <text>]      list a topic's questions");
    eprintln!("  done <question-id>                      mark a question completed");
    eprintln!("  undo <question-id>                      mark a question not completed");
    eprintln!("  stats                                   overall, difficulty and topic progress");
    eprintln!("  streak [--month YYYY-MM]                activity calendar and streaks");
    eprintln!("  contests [--day YYYY-MM-DD]             upcoming programming contests");
    eprintln!("  sign-in --email <e> --password <p>      sign in and pull remote progress");
    eprintln!("  sign-out                                sign out and clear local progress");
    eprintln!("  sync                                    push local progress, then pull");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DSA_PROFILE, DSA_DB_URL, DSA_BACKEND_URL, DSA_BACKEND_ANON_KEY,");
    eprintln!("  DSA_PROGRESS_TABLE, DSA_CONTEST_FEED_URL, DSA_UNCOMPLETE_POLICY,");
    eprintln!("  DSA_PULL_POLICY, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Topics,
    Topic { id: String, filter: Option<String> },
    Done(String),
    Undo(String),
    Stats,
    Streak { month: Option<(i32, u32)> },
    Contests { day: Option<NaiveDate> },
    SignIn { email: String, password: String },
    SignOut,
    Sync,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    db_url: Option<String>,
    command: Command,
}

impl Cli {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let mut db_url = None;

        let name = loop {
            match args.next() {
                None => return Err(ArgsError::MissingCommand),
                Some(arg) if arg == "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(value);
                }
                Some(arg) if arg == "--help" || arg == "-h" || arg == "help" => {
                    return Ok(Self {
                        db_url,
                        command: Command::Help,
                    });
                }
                Some(arg) => break arg,
            }
        };

        let command = match name.as_str() {
            "topics" => Command::Topics,
            "topic" => {
                let id = require_arg(&mut args, "topic id")?;
                let mut filter = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--filter" => filter = Some(require_value(&mut args, "--filter")?),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::Topic { id, filter }
            }
            "done" => Command::Done(require_arg(&mut args, "question id")?),
            "undo" => Command::Undo(require_arg(&mut args, "question id")?),
            "stats" => Command::Stats,
            "streak" => {
                let mut month = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--month" => {
                            let raw = require_value(&mut args, "--month")?;
                            month = Some(parse_month(&raw).ok_or(ArgsError::InvalidMonth { raw })?);
                        }
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::Streak { month }
            }
            "contests" => {
                let mut day = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--day" => {
                            let raw = require_value(&mut args, "--day")?;
                            day = Some(
                                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                                    .map_err(|_| ArgsError::InvalidDay { raw })?,
                            );
                        }
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::Contests { day }
            }
            "sign-in" => {
                let (mut email, mut password) = (None, None);
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--email" => email = Some(require_value(&mut args, "--email")?),
                        "--password" => password = Some(require_value(&mut args, "--password")?),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::SignIn {
                    email: email.ok_or(ArgsError::MissingValue { flag: "--email" })?,
                    password: password.ok_or(ArgsError::MissingValue { flag: "--password" })?,
                }
            }
            "sign-out" => Command::SignOut,
            "sync" => Command::Sync,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(Self { db_url, command })
    }
}

fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.contains("mode=memory") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn mark(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn status_label(status: TopicStatus) -> &'static str {
    match status {
        TopicStatus::NotStarted => "not started",
        TopicStatus::InProgress => "in progress",
        TopicStatus::Complete => "complete",
    }
}

fn find_topic(services: &AppServices, raw: &str) -> Option<Topic> {
    let id = TopicId::new(raw).ok()?;
    let catalog = services.catalog();
    catalog.topic(&id).cloned()
}

async fn set_completed(
    services: &AppServices,
    raw: &str,
    completed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = services.catalog();
    let question = QuestionId::new(raw)
        .ok()
        .and_then(|id| catalog.question(&id))
        .ok_or_else(|| CommandError::UnknownQuestion(raw.to_string()))?;
    services.progress().toggle(question.id(), completed).await?;
    println!("{} {}", mark(completed), question.title());
    Ok(())
}

fn print_topics(services: &AppServices) {
    let catalog = services.catalog();
    let maps = services.progress().snapshot();
    for topic in catalog.topics() {
        let progress = TopicProgress::compute(topic, &maps);
        println!(
            "{:<36} {:>3}/{:<3} {:>5.1}%  {:<12} {}",
            topic.name(),
            progress.tally.solved,
            progress.tally.total,
            progress.tally.percent(),
            status_label(progress.status),
            topic.id(),
        );
    }
}

fn print_topic(services: &AppServices, topic: &Topic, filter: Option<&str>) {
    let maps = services.progress().snapshot();
    println!("{}", topic.name());
    println!("{}", topic.description());
    println!();
    for question in topic.filter(filter.unwrap_or("")) {
        println!(
            "{} {:<40} {:<6} {:<13} {}",
            mark(maps.is_completed(question.id())),
            question.title(),
            question.difficulty(),
            question.platform(),
            question.id(),
        );
        println!("      {}", question.link());
    }
}

fn print_stats(services: &AppServices) {
    let catalog = services.catalog();
    let maps = services.progress().snapshot();

    let summary = ProgressSummary::compute(&catalog, &maps);
    println!(
        "Solved {}/{} ({:.1}%)",
        summary.completed, summary.total, summary.percent
    );

    let breakdown = DifficultyBreakdown::compute(&catalog, &maps);
    for difficulty in Difficulty::ALL {
        let tally = breakdown.get(difficulty);
        println!("  {:<7} {:>3}/{:<3}", difficulty, tally.solved, tally.total);
    }

    let activity = ActivitySummary::compute_in(&maps, services.clock().today_in(&Local), &Local);
    println!(
        "Streak: {} days (best {}), solved today: {}",
        activity.current_streak, activity.best_streak, activity.completed_today
    );
}

fn print_streak(services: &AppServices, month: Option<(i32, u32)>) {
    let today = services.clock().today_in(&Local);
    let (year, month) = month.unwrap_or((today.year(), today.month()));
    let activity = ActivitySummary::compute_in(&services.progress().snapshot(), today, &Local);

    println!("{year}-{month:02}");
    println!(" Su  Mo  Tu  We  Th  Fr  Sa");
    for week in month_grid(year, month).chunks(7) {
        let line: String = week
            .iter()
            .map(|day| {
                if day.month() != month {
                    "    ".to_string()
                } else if activity.is_active(*day) {
                    format!(" {:>2}*", day.day())
                } else {
                    format!(" {:>2} ", day.day())
                }
            })
            .collect();
        println!("{}", line.trim_end());
    }
    println!();
    println!(
        "Current streak: {} days, best: {} days",
        activity.current_streak, activity.best_streak
    );
}

async fn print_contests(
    services: &AppServices,
    day: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let contests = services
        .contests()
        .fetch_upcoming(services.clock().now())
        .await?;
    let shown: Vec<_> = match day {
        Some(day) => on_day(&contests, day).collect(),
        None => contests.iter().collect(),
    };
    if shown.is_empty() {
        println!("No upcoming contests.");
        return Ok(());
    }
    for contest in shown {
        println!(
            "{}  {:<12} {} ({})",
            contest.start.format("%Y-%m-%d %H:%M UTC"),
            contest.platform,
            contest.name,
            contest.formatted_duration(),
        );
        println!("    {}", contest.url);
        println!("    add to calendar: {}", contest.calendar_link()?);
    }
    Ok(())
}

async fn execute(services: &AppServices, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Help => print_usage(),
        Command::Topics => print_topics(services),
        Command::Topic { id, filter } => {
            let topic = find_topic(services, &id).ok_or(CommandError::UnknownTopic(id))?;
            print_topic(services, &topic, filter.as_deref());
        }
        Command::Done(id) => set_completed(services, &id, true).await?,
        Command::Undo(id) => set_completed(services, &id, false).await?,
        Command::Stats => print_stats(services),
        Command::Streak { month } => print_streak(services, month),
        Command::Contests { day } => print_contests(services, day).await?,
        Command::SignIn { email, password } => {
            let auth = services.auth().ok_or(AuthError::NotConfigured)?;
            let progress = services.progress();
            let seen = progress.auth_events_seen();
            let session = auth.sign_in_with_password(&email, &password).await?;
            // The store pulls on its own once it sees the sign-in.
            progress.settle_auth(seen).await;
            println!(
                "Signed in as {}; {} completed questions synced.",
                session.email.as_deref().unwrap_or(&email),
                progress.snapshot().len()
            );
        }
        Command::SignOut => {
            let auth = services.auth().ok_or(AuthError::NotConfigured)?;
            let progress = services.progress();
            let seen = progress.auth_events_seen();
            auth.sign_out().await?;
            progress.settle_auth(seen).await;
            println!("Signed out; local progress cleared.");
        }
        Command::Sync => {
            if services.sessions().current_session().await.is_none() {
                return Err(AuthError::NoSession.into());
            }
            let progress = services.progress();
            progress.push().await;
            progress.pull().await;
            println!("Synced {} completed questions.", progress.snapshot().len());
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if cli.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let mut config = AppConfig::from_env()?;
    if let Some(db_url) = cli.db_url {
        config.db_url = db_url;
    }
    config.db_url = normalize_sqlite_url(config.db_url);
    prepare_sqlite_file(&config.db_url)?;
    debug!(db = %config.db_url, profile = ?config.profile, "starting");

    let services = AppServices::bootstrap(&config, Clock::default_clock()).await?;
    let outcome = execute(&services, cli.command).await;
    // Let queued pushes reach the backend before the runtime shuts down.
    services.progress().flush().await;
    outcome
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("app=info,services=info,storage=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, ArgsError> {
        Cli::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn parses_global_db_and_topic_filter() {
        let cli = parse(&["--db", "sqlite::memory:", "topic", "arrays-hashing", "--filter", "sum"]).unwrap();
        assert_eq!(cli.db_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(
            cli.command,
            Command::Topic {
                id: "arrays-hashing".into(),
                filter: Some("sum".into()),
            }
        );
    }

    #[test]
    fn parses_month_and_day() {
        assert_eq!(
            parse(&["streak", "--month", "2024-02"]).unwrap().command,
            Command::Streak { month: Some((2024, 2)) }
        );
        assert_eq!(
            parse(&["contests", "--day", "2024-02-29"]).unwrap().command,
            Command::Contests {
                day: NaiveDate::from_ymd_opt(2024, 2, 29),
            }
        );
        assert_eq!(
            parse(&["streak", "--month", "2024-13"]).unwrap_err(),
            ArgsError::InvalidMonth { raw: "2024-13".into() }
        );
    }

    #[test]
    fn sign_in_needs_both_flags() {
        assert_eq!(
            parse(&["sign-in", "--email", "a@b.co"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--password" }
        );
    }

    #[test]
    fn rejects_unknown_and_missing() {
        assert_eq!(parse(&[]).unwrap_err(), ArgsError::MissingCommand);
        assert_eq!(
            parse(&["frobnicate"]).unwrap_err(),
            ArgsError::UnknownCommand("frobnicate".into())
        );
        assert_eq!(
            parse(&["done"]).unwrap_err(),
            ArgsError::MissingArgument { what: "question id" }
        );
        assert_eq!(
            parse(&["stats", "extra"]).unwrap_err(),
            ArgsError::UnknownArg("extra".into())
        );
    }

    #[test]
    fn memory_urls_are_left_alone() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite://data/dsa.sqlite3".into()),
            "sqlite://data/dsa.sqlite3"
        );
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }
}
