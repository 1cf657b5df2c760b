use std::fmt;
use std::path::PathBuf;

use doric_core::geo::{GeoPoint, GeoPointError};
use doric_core::model::{UserId, UserIdError};

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    MissingCommand,
    UnknownCommand(String),
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidSteps { raw: String },
    InvalidUser { raw: String, source: UserIdError },
    InvalidCoordinate { flag: &'static str, raw: String },
    InvalidLocation(GeoPointError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSteps { raw } => write!(f, "invalid --steps value: {raw}"),
            ArgsError::InvalidUser { raw, source } => {
                write!(f, "invalid --user value {raw:?}: {source}")
            }
            ArgsError::InvalidCoordinate { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidLocation(err) => write!(f, "invalid location: {err}"),
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Login,
    Train,
    Status,
    Sync,
    Reset,
    Delete,
    Watch,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "login" => Some(Self::Login),
            "train" => Some(Self::Train),
            "status" => Some(Self::Status),
            "sync" => Some(Self::Sync),
            "reset" => Some(Self::Reset),
            "delete" => Some(Self::Delete),
            "watch" => Some(Self::Watch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    /// Print the summary of the reference place.
    About,
    /// Print the distance from the given point to Aberdeen.
    Distance(GeoPoint),
    Run(Args),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub command: Command,
    pub db_url: String,
    pub remote_url: Option<String>,
    pub lesson_path: Option<PathBuf>,
    pub user: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub steps: u32,
    pub offline: bool,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  doric login  --user <id> --name <name> --email <email>");
    eprintln!("  doric train  --user <id> [--steps <n>] [--offline]");
    eprintln!("  doric status --user <id>");
    eprintln!("  doric sync   --user <id>");
    eprintln!("  doric reset  --user <id>");
    eprintln!("  doric delete --user <id>");
    eprintln!("  doric watch  --user <id>");
    eprintln!("  doric about");
    eprintln!("  doric distance --lat <degrees> --lon <degrees>");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>     default sqlite://doric.sqlite3");
    eprintln!("  --remote <url>        remote progress store base URL");
    eprintln!("  --lesson <path>       lesson JSON file (default: built-in Conversation course)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DORIC_DB_URL, DORIC_REMOTE_URL, DORIC_REMOTE_TOKEN, DORIC_REMOTE_TIMEOUT_SECS,");
    eprintln!("  DORIC_PROBE_ADDR, DORIC_PROBE_INTERVAL_SECS, DORIC_PROBE_TIMEOUT_MS,");
    eprintln!("  DORIC_SUMMARY_URL, RUST_LOG");
}

impl Invocation {
    pub fn parse_env() -> Result<Self, ArgsError> {
        let default_db = std::env::var("DORIC_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "sqlite://doric.sqlite3".into());
        Self::parse(std::env::args().skip(1), default_db)
    }

    pub fn parse(
        args: impl IntoIterator<Item = String>,
        default_db: String,
    ) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let command = match args.next() {
            None => return Err(ArgsError::MissingCommand),
            Some(first) if first == "--help" || first == "-h" => return Ok(Self::Help),
            Some(first) if first == "about" => return Self::parse_about(args),
            Some(first) if first == "distance" => return Self::parse_distance(args),
            Some(first) => Command::from_arg(&first).ok_or(ArgsError::UnknownCommand(first))?,
        };

        let mut db_url = default_db;
        let mut remote_url = None;
        let mut lesson_path = None;
        let mut user = None;
        let mut name = None;
        let mut email = None;
        let mut steps = 1;
        let mut offline = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--remote" => remote_url = Some(require_value(&mut args, "--remote")?),
                "--lesson" => {
                    lesson_path = Some(PathBuf::from(require_value(&mut args, "--lesson")?));
                }
                "--user" => {
                    let raw = require_value(&mut args, "--user")?;
                    let parsed = UserId::new(&raw)
                        .map_err(|source| ArgsError::InvalidUser { raw, source })?;
                    user = Some(parsed);
                }
                "--name" => name = Some(require_value(&mut args, "--name")?),
                "--email" => email = Some(require_value(&mut args, "--email")?),
                "--steps" if command == Command::Train => {
                    let value = require_value(&mut args, "--steps")?;
                    steps = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSteps { raw: value.clone() })?;
                }
                "--offline" if command == Command::Train => offline = true,
                "--help" | "-h" => return Ok(Self::Help),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let user = user.ok_or(ArgsError::MissingFlag { flag: "--user" })?;
        if command == Command::Login {
            if name.is_none() {
                return Err(ArgsError::MissingFlag { flag: "--name" });
            }
            if email.is_none() {
                return Err(ArgsError::MissingFlag { flag: "--email" });
            }
        }

        Ok(Self::Run(Args {
            command,
            db_url: normalize_sqlite_url(db_url),
            remote_url,
            lesson_path,
            user,
            name,
            email,
            steps,
            offline,
        }))
    }
}

impl Invocation {
    fn parse_about(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        match args.next() {
            None => Ok(Self::About),
            Some(arg) if arg == "--help" || arg == "-h" => Ok(Self::Help),
            Some(arg) => Err(ArgsError::UnknownArg(arg)),
        }
    }

    fn parse_distance(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut lat = None;
        let mut lon = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--lat" => lat = Some(parse_coordinate(&mut args, "--lat")?),
                "--lon" => lon = Some(parse_coordinate(&mut args, "--lon")?),
                "--help" | "-h" => return Ok(Self::Help),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        let lat = lat.ok_or(ArgsError::MissingFlag { flag: "--lat" })?;
        let lon = lon.ok_or(ArgsError::MissingFlag { flag: "--lon" })?;
        GeoPoint::new(lat, lon)
            .map(Self::Distance)
            .map_err(ArgsError::InvalidLocation)
    }
}

fn parse_coordinate(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<f64, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidCoordinate { flag, raw })
}

/// Turn a file path or relative `sqlite:` URL into an absolute URL that
/// creates the database on first use.
pub fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.contains("mode=memory") {
        return trimmed.to_string();
    }

    let without_scheme = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_str, query) = match without_scheme.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_scheme, None),
    };

    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    match query {
        Some(query) if query.contains("mode=") => format!("sqlite://{}?{query}", absolute.display()),
        Some(query) => format!("sqlite://{}?{query}&mode=rwc", absolute.display()),
        None => format!("sqlite://{}?mode=rwc", absolute.display()),
    }
}
