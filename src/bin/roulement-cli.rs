#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use clap::{Parser, Subcommand};
use roulement::{
    io, ConfigurationProvider, DisplayFilter, EngineError, JsonConfig, JsonStore, ScheduleEngine,
    ShiftType, ShiftTypeCatalog, Toggle,
};
use std::sync::Arc;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// Roulement 4/2 : quelle équipe est de quel poste, à n'importe quelle date
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON des préférences (ancrage, équipe, affichage)
    #[arg(long, global = true, default_value = "roulement.json")]
    config: String,

    /// Fichier JSON du catalogue des types de poste
    #[arg(long, global = true, default_value = "shift-types.json")]
    catalog: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Afficher une journée (aujourd'hui par défaut)
    Day {
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },

    /// Afficher un mois et optionnellement l'exporter
    Month {
        /// YYYY-MM (mois courant par défaut)
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
    },

    /// Position d'une date dans le cycle
    Cycle {
        #[arg(long)]
        date: String,
    },

    /// Diagnostic du moteur (JSON)
    Info,

    /// Changer la date d'ancrage (jour 0 du cycle)
    SetAnchor {
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
    },

    /// Choisir son équipe (A à I)
    MyTeam {
        #[arg(long)]
        team: char,
    },

    /// Activer ou désactiver une option d'affichage
    Toggle {
        /// show_morning, show_afternoon, show_night, show_rest, highlight_my_team
        #[arg(long)]
        name: String,
        #[arg(long, action = clap::ArgAction::Set)]
        value: bool,
    },

    /// Gérer le catalogue des types de poste
    ShiftTypes {
        #[command(subcommand)]
        cmd: ShiftTypeCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ShiftTypeCommands {
    /// Lister les types actifs
    List,
    /// Ajouter un type de poste
    Add {
        #[arg(long)]
        name: String,
        /// HH:MM
        #[arg(long)]
        start: String,
        #[arg(long)]
        duration_minutes: u32,
        #[arg(long, default_value = "#607D8B")]
        color: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        rest: bool,
    },
    /// Désactiver un type de poste (suppression logique)
    Remove {
        #[arg(long)]
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let store = Arc::new(JsonStore::open(&cli.catalog)?);
    let catalog = Arc::new(ShiftTypeCatalog::new(store));
    let config: Arc<dyn ConfigurationProvider> = Arc::new(JsonConfig::open(&cli.config)?);
    let engine = ScheduleEngine::new(Arc::clone(&catalog), Some(config));

    let code = match cli.cmd {
        Commands::Day { date } => {
            engine.init()?;
            let date = match date {
                Some(raw) => parse_date(&raw)?,
                None => Local::now().date_naive(),
            };
            let Some(day) = engine.day_by_date(date) else {
                bail!("no schedule available for {date}");
            };
            println!("{}", filter(&engine)?.apply(&day));
            0
        }
        Commands::Month {
            month,
            out_json,
            out_csv,
        } => {
            engine.init()?;
            let month = match month {
                Some(raw) => parse_date(&format!("{raw}-01"))?,
                None => Local::now().date_naive(),
            };
            let days = engine.shifts_for_month(month);
            if let Some(path) = out_json {
                io::export_month_json(path, &days)?;
            }
            if let Some(path) = out_csv {
                io::export_month_csv(path, &days)?;
            }
            let filter = filter(&engine)?;
            for day in &days {
                println!("{}", filter.apply(day));
            }
            0
        }
        Commands::Cycle { date } => {
            let date = parse_date(&date)?;
            if let Err(err) = engine.init() {
                eprintln!("Warning: {err}");
            }
            // -1 : moteur non initialisé
            let position = engine.day_in_cycle(date);
            println!("{position}");
            if position < 0 {
                1
            } else {
                0
            }
        }
        Commands::Info => {
            // le diagnostic reste disponible même si l'initialisation échoue
            let ready = match engine.init() {
                Ok(()) => true,
                Err(err) => {
                    eprintln!("Warning: {err}");
                    false
                }
            };
            println!("{}", serde_json::to_string_pretty(&engine.cycle_info())?);
            if ready {
                0
            } else {
                2
            }
        }
        Commands::SetAnchor { date } => {
            let date = parse_date(&date)?;
            engine.regenerate_scheme_with_new_date(date)?;
            println!("anchor set to {date}");
            0
        }
        Commands::MyTeam { team } => {
            engine.init()?;
            engine.set_my_team_letter(team)?;
            println!("my team: {}", team.to_ascii_uppercase());
            0
        }
        Commands::Toggle { name, value } => {
            let Some(toggle) = Toggle::from_key(&name) else {
                bail!("unknown toggle: {name}");
            };
            engine.init()?;
            engine.set_toggle(toggle, value)?;
            0
        }
        Commands::ShiftTypes { cmd } => match cmd {
            ShiftTypeCommands::List => {
                for t in catalog.load()?.iter() {
                    println!(
                        "{} | {} | {}-{} | {}{}",
                        t.id.map(|id| id.to_string()).unwrap_or_default(),
                        t.name,
                        t.start_time().format("%H:%M"),
                        t.end_time().format("%H:%M"),
                        t.color,
                        if t.is_rest_type { " | rest" } else { "" }
                    );
                }
                0
            }
            ShiftTypeCommands::Add {
                name,
                start,
                duration_minutes,
                color,
                description,
                rest,
            } => {
                catalog.load()?;
                let start = NaiveTime::parse_from_str(&start, "%H:%M")
                    .with_context(|| format!("invalid start time: {start}"))?;
                let mut shift_type = ShiftType::new(
                    name,
                    start.hour() as u8,
                    start.minute() as u8,
                    duration_minutes,
                    color,
                );
                shift_type.description = description.unwrap_or_default();
                shift_type.is_rest_type = rest;
                let saved = catalog.save(shift_type)?;
                println!("created {} ({})", saved.name, saved.id.map(|id| id.get()).unwrap_or(0));
                0
            }
            ShiftTypeCommands::Remove { name } => {
                let shift_type = catalog.get_by_name(&name)?;
                let Some(id) = shift_type.id else {
                    bail!("shift type {name} has no id");
                };
                catalog.soft_delete(id)?;
                println!("deactivated {}", shift_type.name);
                0
            }
        },
    };

    std::process::exit(code);
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").with_context(|| format!("invalid date: {raw}"))
}

fn filter(engine: &ScheduleEngine) -> Result<DisplayFilter, EngineError> {
    engine
        .preferences()
        .map(DisplayFilter::new)
        .ok_or(EngineError::PreconditionViolation("engine not initialized"))
}
