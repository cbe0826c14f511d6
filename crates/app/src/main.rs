use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use quiz_core::TickOutcome;
use quiz_core::model::{Difficulty, SessionResult};
use services::{
    ActiveSession, Clock, FallbackSupplier, LeaderboardService, QuestionSupplier, QuizRequest,
    QuizSessionService, RemoteSupplier, RemoteSupplierConfig, SessionError, StaticSupplier,
};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidDifficulty { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    RemoteNotConfigured,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value: {raw} (easy, medium, hard, expert)")
            }
            ArgsError::InvalidNumber { flag, raw } => {
                write!(f, "invalid {flag} value: {raw} (expected a positive number)")
            }
            ArgsError::RemoteNotConfigured => {
                write!(f, "--remote requires QUIZ_API_BASE_URL to be set")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_positive(flag: &'static str, raw: String) -> Result<u32, ArgsError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ArgsError::InvalidNumber { flag, raw }),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quizzy play        [--topic <t>] [--difficulty <d>] [--count <n>]");
    eprintln!("                     [--player <name>] [--db <sqlite_url>] [--remote]");
    eprintln!("  quizzy leaderboard [--limit <n>] [--db <sqlite_url>]");
    eprintln!("  quizzy history     [--player <name>] [--limit <n>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --topic Programming  --difficulty medium  --count 5  --limit 10");
    eprintln!("  --db sqlite://quizzy.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_PLAYER, QUIZ_API_BASE_URL, QUIZ_API_TOKEN,");
    eprintln!("  QUIZ_API_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Leaderboard,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "leaderboard" => Some(Self::Leaderboard),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    player: String,
    topic: String,
    difficulty: Difficulty,
    count: u32,
    limit: u32,
    remote: bool,
}

impl Args {
    fn from_env() -> Self {
        let db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| "sqlite://quizzy.sqlite3".into(), normalize_sqlite_url);
        let player = std::env::var("QUIZ_PLAYER")
            .ok()
            .or_else(|| std::env::var("USER").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "player".into());
        Self {
            db_url,
            player,
            ..Self::default()
        }
    }

    fn parse(
        mut self,
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        while let Some(arg) = args.next() {
            match (cmd, arg.as_str()) {
                (_, "--db") => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                (Command::Play | Command::History, "--player") => {
                    self.player = require_value(args, "--player")?;
                }
                (Command::Play, "--topic") => {
                    self.topic = require_value(args, "--topic")?;
                }
                (Command::Play, "--difficulty") => {
                    let value = require_value(args, "--difficulty")?;
                    self.difficulty = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDifficulty { raw: value.clone() })?;
                }
                (Command::Play, "--count") => {
                    self.count = parse_positive("--count", require_value(args, "--count")?)?;
                }
                (Command::Play, "--remote") => self.remote = true,
                (Command::Leaderboard | Command::History, "--limit") => {
                    self.limit = parse_positive("--limit", require_value(args, "--limit")?)?;
                }
                (_, "--help" | "-h") => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(self)
    }
}

impl Default for Args {
    fn default() -> Self {
        Self {
            db_url: "sqlite://quizzy.sqlite3".into(),
            player: "player".into(),
            topic: "Programming".into(),
            difficulty: Difficulty::Medium,
            count: 5,
            limit: 10,
            remote: false,
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
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
    if db_url == "sqlite::memory:" {
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

fn build_supplier(remote: bool) -> Result<Arc<dyn QuestionSupplier>, Box<dyn std::error::Error>> {
    let fixtures = StaticSupplier::new().with_shuffle(true);
    if !remote {
        return Ok(Arc::new(fixtures));
    }
    let config = RemoteSupplierConfig::from_env().ok_or(ArgsError::RemoteNotConfigured)?;
    info!("using remote questions from {}", config.base_url());
    let remote = RemoteSupplier::new(config)?;
    Ok(Arc::new(FallbackSupplier::new(remote, fixtures)))
}

fn print_question(session: &ActiveSession) {
    let engine = session.engine();
    let Some(question) = engine.current_question() else {
        return;
    };
    println!();
    println!(
        "Question {}/{}  ({} pts, {}s)  score {}  streak {}",
        engine.current_index() + 1,
        engine.questions().len(),
        question.points(),
        engine.time_remaining(),
        engine.score(),
        engine.streak()
    );
    println!("{}", question.prompt());
    for (i, option) in question.options().iter().enumerate() {
        println!("  {}) {option}", i + 1);
    }
    println!("Answer with a number, or q to quit.");
}

fn print_explanation(session: &ActiveSession, index: usize) {
    if let Some(text) = session
        .engine()
        .questions()
        .get(index)
        .and_then(|q| q.explanation())
    {
        println!("  {text}");
    }
}

fn print_result(result: &SessionResult) {
    println!();
    println!("Quiz complete!");
    println!("  score     {}", result.total_score());
    println!(
        "  correct   {}/{}",
        result.correct_count(),
        result.total_questions()
    );
    println!("  accuracy  {}%", result.accuracy_percent());
    println!("  streak    {}", result.best_streak());
}

async fn play(args: &Args, storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let supplier = build_supplier(args.remote)?;
    let svc = QuizSessionService::new(Clock::system(), supplier, Arc::clone(&storage.results));
    let count = usize::try_from(args.count).unwrap_or(usize::MAX);
    let request = QuizRequest::new(args.topic.clone(), args.difficulty, count)?;
    let mut session = svc.start_session(&args.player, request).await?;

    if session.difficulty() != args.difficulty {
        println!(
            "Difficulty adjusted to {} based on your recent results.",
            session.difficulty()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    print_question(&session);

    while !session.is_complete() {
        tokio::select! {
            _ = ticker.tick() => {
                let answered = session.engine().is_current_answered();
                match svc.tick(&mut session).await? {
                    TickOutcome::Running { time_remaining } => {
                        if !answered && time_remaining > 0 && time_remaining % 10 == 0 {
                            println!("  {time_remaining}s left");
                        }
                    }
                    TickOutcome::TimedOut { outcome, completed } => {
                        let correct = session
                            .engine()
                            .questions()
                            .get(outcome.question_index)
                            .and_then(|q| q.options().get(outcome.correct_index))
                            .cloned()
                            .unwrap_or_default();
                        println!("Time's up! The answer was: {correct}");
                        print_explanation(&session, outcome.question_index);
                        if !completed {
                            print_question(&session);
                        }
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!("Input closed; session abandoned.");
                    return Ok(());
                };
                let input = line.trim();
                if input.eq_ignore_ascii_case("q") {
                    println!("Session abandoned.");
                    return Ok(());
                }

                if session.engine().is_current_answered() {
                    svc.advance(&mut session).await?;
                    ticker.reset();
                    print_question(&session);
                    continue;
                }

                let Some(choice) = input.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
                    println!("Please enter an option number.");
                    continue;
                };
                match svc.answer(&mut session, choice) {
                    Ok(outcome) if outcome.correct => {
                        println!(
                            "Correct! +{} (score {}, streak {})",
                            outcome.points_awarded, outcome.score, outcome.streak
                        );
                        print_explanation(&session, outcome.question_index);
                        println!("Press Enter to continue.");
                    }
                    Ok(outcome) => {
                        println!("Incorrect. The answer was option {}.", outcome.correct_index + 1);
                        print_explanation(&session, outcome.question_index);
                        println!("Press Enter to continue.");
                    }
                    Err(SessionError::Engine(err)) => println!("{err}"),
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    let result = session.engine().result()?;
    print_result(&result);
    Ok(())
}

async fn leaderboard(args: &Args, storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let rows = LeaderboardService::new(Arc::clone(&storage.results))
        .top(args.limit)
        .await?;
    if rows.is_empty() {
        println!("No completed sessions yet.");
        return Ok(());
    }
    println!("{:<4} {:<20} {:>10} {:>9} {:>9}", "#", "player", "score", "sessions", "best");
    for (rank, row) in rows.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:>10} {:>9} {:>8}%",
            rank + 1,
            row.player,
            row.total_score,
            row.sessions,
            row.best_accuracy
        );
    }
    Ok(())
}

async fn history(args: &Args, storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let service = LeaderboardService::new(Arc::clone(&storage.results));
    let rows = service.history(&args.player, args.limit).await?;
    if rows.is_empty() {
        println!("No sessions recorded for {}.", args.player);
        return Ok(());
    }
    for row in &rows {
        let record = &row.record;
        let result = record.result();
        println!(
            "{}  {:<16} {:<7} {:>6} pts  {}/{} ({}%)  {}s",
            record.completed_at().format("%Y-%m-%d %H:%M"),
            record.topic(),
            record.difficulty(),
            result.total_score(),
            result.correct_count(),
            result.total_questions(),
            result.accuracy_percent(),
            record.duration_secs()
        );
    }

    let streak = service.activity_streak(&args.player).await?;
    println!();
    println!("Daily streak: {} (best {})", streak.current, streak.best);
    let recommendations = service.recommendations(&args.player).await?;
    if !recommendations.is_empty() {
        println!("Suggested next:");
        for rec in &recommendations {
            println!("  {:<20} {:<7} {}", rec.topic, rec.difficulty, rec.reason);
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: play when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::from_env().parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Play => play(&parsed, &storage).await,
        Command::Leaderboard => leaderboard(&parsed, &storage).await,
        Command::History => history(&parsed, &storage).await,
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: Command, args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::default().parse(cmd, &mut iter)
    }

    #[test]
    fn play_flags_are_parsed() {
        let args = parse(
            Command::Play,
            &["--topic", "Science", "--difficulty", "HARD", "--count", "3", "--remote"],
        )
        .unwrap();
        assert_eq!(args.topic, "Science");
        assert_eq!(args.difficulty, Difficulty::Hard);
        assert_eq!(args.count, 3);
        assert!(args.remote);
    }

    #[test]
    fn flags_are_scoped_to_commands() {
        assert!(matches!(
            parse(Command::Leaderboard, &["--topic", "Science"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(Command::Play, &["--limit", "3"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert_eq!(parse(Command::History, &["--limit", "3"]).unwrap().limit, 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse(Command::Play, &["--count", "0"]),
            Err(ArgsError::InvalidNumber { flag: "--count", .. })
        ));
        assert!(matches!(
            parse(Command::Play, &["--difficulty", "impossible"]),
            Err(ArgsError::InvalidDifficulty { .. })
        ));
        assert!(matches!(
            parse(Command::Play, &["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/q.sqlite3".into()),
            "sqlite:///tmp/q.sqlite3"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:/tmp/q.sqlite3".into()),
            "sqlite:///tmp/q.sqlite3"
        );
    }
}
