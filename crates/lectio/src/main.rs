use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lectio::{
    fetch_schedule, ClientConfig, MalformedEntryPolicy, Room, ScheduleQuery, ScheduleTarget,
    SessionManager, User, UserKind,
};

#[derive(Parser)]
#[command(name = "lectio", version, about = "Fetch data from the Lectio school portal")]
struct Cli {
    /// Institution id, as in https://www.lectio.dk/lectio/<id>/login.aspx
    #[arg(short, long, env = "LECTIO_INSTITUTION")]
    institution: Option<u32>,

    /// JSON client configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, env = "LECTIO_USERNAME")]
    username: String,

    #[arg(long, env = "LECTIO_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the logged-in user
    Me,
    /// Show a student or teacher
    User {
        #[arg(value_enum)]
        kind: KindArg,
        id: u64,
    },
    /// List schedule entries for a date range (both days inclusive)
    Schedule {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Leave out entries that can't be decoded instead of failing
        #[arg(long)]
        skip_malformed: bool,
    },
    /// Check whether a room is free
    RoomAvailable {
        id: u64,
        /// Local time, e.g. 2024-03-01T10:00:00; defaults to now
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Student,
    Teacher,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    #[arg(long)]
    student: Option<u64>,
    #[arg(long)]
    teacher: Option<u64>,
    #[arg(long)]
    room: Option<u64>,
}

impl TargetArgs {
    fn target(&self) -> Option<ScheduleTarget> {
        self.student
            .map(ScheduleTarget::Student)
            .or(self.teacher.map(ScheduleTarget::Teacher))
            .or(self.room.map(ScheduleTarget::Room))
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(institution) = cli.institution {
        config.institution_id = institution;
    }
    if config.institution_id == 0 {
        bail!("no institution id given (use --institution or the config file)");
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(institution = config.institution_id, "Starting Lectio client");

    let mut session = SessionManager::new(config)?;
    session
        .authenticate(&cli.username, &cli.password, true)
        .await
        .context("login failed")?;

    match &cli.command {
        Command::Me => {
            let mut me = User::me(&mut session).await?;
            me.populate(&mut session).await?;
            print_json(&me)?;
        }
        Command::User { kind, id } => {
            let kind = match kind {
                KindArg::Student => UserKind::Student,
                KindArg::Teacher => UserKind::Teacher,
            };
            let mut user = User::summary(*id, kind, None);
            user.populate(&mut session).await?;
            print_json(&user)?;
        }
        Command::Schedule {
            target,
            from,
            to,
            skip_malformed,
        } => {
            let Some(target) = target.target() else {
                bail!("one of --student, --teacher or --room is required");
            };
            let policy = if *skip_malformed {
                MalformedEntryPolicy::Skip
            } else {
                MalformedEntryPolicy::Abort
            };
            let query = ScheduleQuery::for_days(target, *from, *to).on_malformed(policy);
            let records = fetch_schedule(&mut session, &query).await?;
            print_json(&records)?;
        }
        Command::RoomAvailable { id, at } => {
            let at = at.unwrap_or_else(|| Local::now().naive_local());
            let room = Room::new(*id, id.to_string());
            let available = room.is_available(&mut session, at).await?;
            print_json(&serde_json::json!({ "room": id, "at": at, "available": available }))?;
        }
    }

    Ok(())
}
