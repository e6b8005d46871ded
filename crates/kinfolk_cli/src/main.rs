//! Kinfolk demo driver.
//!
//! # Responsibility
//! - Stand in for a presentation layer: turn user actions into commands.
//! - Print committed query results in a stable tab-separated layout.
//!
//! Configuration precedence: JSON file, then `KINFOLK_*` environment, then
//! flags.

use clap::{Args, Parser, Subcommand};
use kinfolk_core::{
    init_logging, Command, EntityStore, FamilyId, ListQuery, LogLevel, MutationService,
    NewPerson, PersonId, QueryService, SortKey, StoreConfig,
};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const PREVIEW_NAME: &str = "Sam";

#[derive(Parser, Debug)]
#[command(name = "kinfolk", version, about = "Person and family records demo")]
struct Cli {
    /// SQLite database file
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Keep records in memory only; nothing survives the process
    #[arg(long, global = true)]
    in_memory: bool,

    /// Detach members instead of refusing to delete a non-empty family
    #[arg(long, global = true)]
    cascade: bool,

    /// JSON store configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off without it
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error; only valid together with --log-dir
    #[arg(long, value_name = "LEVEL", global = true, requires = "log_dir")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Add one person; a random sample person when neither name nor age is
    /// given, otherwise the configured default name
    AddPerson {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        age: Option<i64>,
    },
    /// Add a family together with generated members
    AddFamily {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        members: Option<u32>,
    },
    /// Rename a person
    Rename { id: i64, name: String },
    /// Delete a person
    Delete { id: i64 },
    /// Delete a family
    DeleteFamily { id: i64 },
    /// Move a person into a family
    Join { family: i64, person: i64 },
    /// List persons
    List(ListArgs),
    /// List families
    Families(ListArgs),
    /// Insert the preview data set in one commit
    Seed {
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-sensitive name substring
    #[arg(long)]
    filter: Option<String>,
    /// id|name|age|gender|member-count
    #[arg(long)]
    sort: Option<SortKey>,
    #[arg(long)]
    desc: bool,
}

impl ListArgs {
    fn to_query(&self) -> ListQuery {
        ListQuery {
            filter: self.filter.clone(),
            sort: self.sort,
            descending: self.desc,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("kinfolk: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| LogLevel::build_default().as_str().to_string());
        init_logging(&level, log_dir)?;
    }

    let config = resolve_config(&cli)?;
    let mut store = EntityStore::open(&config)?;
    let queries = QueryService::new(store.committed_view());
    info!(
        "event=cli_start module=cli status=ok mode={}",
        store.mode().as_str()
    );

    match cli.command {
        CliCommand::List(args) => {
            for person in queries.list_persons(&args.to_query())? {
                let family = person
                    .family_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string());
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    person.id,
                    person.display_name(),
                    person.age,
                    person.gender.as_deref().unwrap_or("-"),
                    family
                );
            }
        }
        CliCommand::Families(args) => {
            for family in queries.list_families(&args.to_query())? {
                println!(
                    "{}\t{}\t{}",
                    family.id,
                    family.name.as_deref().unwrap_or("No name"),
                    family.member_count()
                );
            }
        }
        CliCommand::Seed { count } => {
            let mut service = MutationService::new(&mut store, &config);
            for _ in 0..count {
                service.create_person(NewPerson::named(PREVIEW_NAME))?;
            }
            let summary = service.commit()?;
            if summary.is_noop() {
                println!("nothing to seed");
            } else {
                println!("seeded {} person(s)", summary.persons_written);
            }
        }
        other => {
            let Some(command) = to_command(other) else {
                return Ok(());
            };
            let mut service = MutationService::new(&mut store, &config);
            let outcome = service.execute(command)?;
            println!("{:?} {}", outcome.effect, outcome.target);
        }
    }

    Ok(())
}

/// Maps single-command subcommands; listing and seeding have no command.
fn to_command(command: CliCommand) -> Option<Command> {
    let command = match command {
        CliCommand::AddPerson { name: None, age } => match age {
            None => Command::CreateSamplePerson,
            Some(age) => Command::CreatePerson(NewPerson::default().with_age(age)),
        },
        CliCommand::AddPerson {
            name: Some(name),
            age,
        } => Command::CreatePerson(NewPerson {
            age,
            ..NewPerson::named(name)
        }),
        CliCommand::AddFamily { name, members } => Command::CreateFamily {
            name,
            member_count: members,
        },
        CliCommand::Rename { id, name } => Command::RenamePerson {
            id: PersonId(id),
            new_name: name,
        },
        CliCommand::Delete { id } => Command::DeletePerson { id: PersonId(id) },
        CliCommand::DeleteFamily { id } => Command::DeleteFamily { id: FamilyId(id) },
        CliCommand::Join { family, person } => Command::AddMember {
            family_id: FamilyId(family),
            person_id: PersonId(person),
        },
        CliCommand::List(_) | CliCommand::Families(_) | CliCommand::Seed { .. } => return None,
    };
    Some(command)
}

fn resolve_config(cli: &Cli) -> Result<StoreConfig, Box<dyn Error>> {
    let mut config = match cli.config.as_deref() {
        Some(path) => load_config_file(path)?.with_env()?,
        None => StoreConfig::from_env()?,
    };

    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    if cli.in_memory {
        config.in_memory = true;
    }
    if cli.cascade {
        config.cascade_delete_family = true;
    }
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<StoreConfig, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
    let config: StoreConfig = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid config `{}`: {err}", path.display()))?;
    Ok(config)
}
