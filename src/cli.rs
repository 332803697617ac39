//! CLI for mri-envlog: record readings, rebuild the dashboard, publish it.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::contract::RecordStore;
use crate::deploy::{self, DispatchOutcome, TokioCommandRunner};
use crate::export::export_records;
use crate::load_config::{load_app_config, load_publish_settings};
use crate::publish::{self, PublishDirs, Publisher};
use crate::store::{LogStore, NewReading, StatusFlag, DB_FILE_NAME, OPERATOR_MAX_LEN};
use crate::toolchain::PathLocator;

/// The failure transcript is bounded to this many characters for display.
pub const TRANSCRIPT_DISPLAY_LIMIT: usize = 1500;

#[derive(Parser)]
#[clap(
    name = "mri-envlog",
    version,
    about = "Registro Parametri Ambientali MRI: record readings, rebuild the dashboard and publish it to surge.sh"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "envlog.yaml")]
    pub config: PathBuf,
    /// Application root: holds the database and the dashboardmri publish directory
    #[clap(long, global = true, default_value = ".")]
    pub root: PathBuf,
    /// Override the database file location
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a new reading, rebuild the dashboard and publish it
    Log {
        /// O2 concentration (%)
        #[clap(long)]
        o2: String,
        /// Relative humidity, probe 1 (%)
        #[clap(long)]
        rh1: String,
        /// Temperature, probe 1 (°C)
        #[clap(long)]
        temp1: String,
        /// Relative humidity, probe 2 (%)
        #[clap(long)]
        rh2: String,
        /// Temperature, probe 2 (°C)
        #[clap(long)]
        temp2: String,
        /// Helium level check (SI/NO)
        #[clap(long)]
        elio: StatusFlag,
        /// Forced extraction check (SI/NO)
        #[clap(long)]
        aspirazione: StatusFlag,
        /// Operator identifier (max 10 characters)
        #[clap(long)]
        operatore: String,
    },
    /// Rebuild the dashboard from the store and publish it
    Publish,
    /// Rebuild the dashboard locally without publishing
    Refresh,
    /// Export the record table to a standalone HTML file
    Export {
        /// Lower bound, e.g. 01/03/24 or 2024-03-01 14:30
        #[clap(long)]
        from: Option<String>,
        /// Upper bound, same formats as --from
        #[clap(long)]
        to: Option<String>,
        #[clap(long)]
        out: PathBuf,
    },
    /// Copy the database to a backup file
    Backup {
        #[clap(long)]
        out: PathBuf,
    },
    /// Replace the database with a backup
    Restore {
        #[clap(long)]
        input: PathBuf,
        /// Confirm overwriting the current database
        #[clap(long)]
        yes: bool,
    },
}

/// Async CLI entrypoint, shared by `main()` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| cli.root.join(DB_FILE_NAME));
    let dirs = PublishDirs::from_root(&cli.root);

    match cli.command {
        Commands::Log {
            o2,
            rh1,
            temp1,
            rh2,
            temp2,
            elio,
            aspirazione,
            operatore,
        } => {
            let reading = NewReading {
                o2: parse_sensor_value(&o2, "Percentuale O2")?,
                rh1: parse_sensor_value(&rh1, "RH Umidità 1")?,
                temp1: parse_sensor_value(&temp1, "Temperatura 1")?,
                rh2: parse_sensor_value(&rh2, "RH Umidità 2")?,
                temp2: parse_sensor_value(&temp2, "Temperatura 2")?,
                elio_ok: elio,
                aspirazione_ok: aspirazione,
                operatore: validate_operator(&operatore)?,
            };

            let settings = load_publish_settings(&cli.config)?;
            let store = LogStore::open(&db_path)?;
            let saved = store.insert(reading)?;
            println!(
                "Registrazione salvata alle {}",
                crate::dashboard::display_timestamp(&saved.timestamp)
            );

            publish_and_deploy(&store, &dirs, &settings).await
        }
        Commands::Publish => {
            let settings = load_publish_settings(&cli.config)?;
            let store = LogStore::open(&db_path)?;
            publish_and_deploy(&store, &dirs, &settings).await
        }
        Commands::Refresh => {
            let app = load_app_config(&cli.config)?;
            let store = LogStore::open(&db_path)?;
            let paths = publish::prepare_dashboard(&store, &dirs, app.chart_offline)?;
            println!("Dashboard rigenerata: {}", paths.entry_point.display());
            println!("Copia storica: {}", paths.archive.display());
            Ok(())
        }
        Commands::Export { from, to, out } => {
            let start = from
                .as_deref()
                .map(|s| parse_filter_date(s, true))
                .transpose()?;
            let end = to
                .as_deref()
                .map(|s| parse_filter_date(s, false))
                .transpose()?;
            let store = LogStore::open(&db_path)?;
            let records = store.query_range(start, end)?;
            if records.is_empty() {
                bail!("Non ci sono record per l'intervallo selezionato.");
            }
            export_records(&records, start, end, &out)
                .with_context(|| format!("Impossibile scrivere {}", out.display()))?;
            println!("Esportazione HTML completata: {}", out.display());
            Ok(())
        }
        Commands::Backup { out } => {
            let store = LogStore::open(&db_path)?;
            store.backup_to(&out)?;
            println!("Backup salvato in: {}", out.display());
            Ok(())
        }
        Commands::Restore { input, yes } => {
            if !input.exists() {
                bail!("Il file di backup {} non esiste.", input.display());
            }
            if !yes {
                bail!("Il ripristino sovrascrive il database corrente: ripeti con --yes per confermare.");
            }
            LogStore::restore_from(&input, &db_path)?;
            println!("Database ripristinato da: {}", input.display());
            Ok(())
        }
    }
}

/// Renders + commits on this task, then queues the deploy on the single-slot
/// publisher and waits for its verdict.
async fn publish_and_deploy(
    store: &LogStore,
    dirs: &PublishDirs,
    settings: &crate::config::PublishSettings,
) -> Result<()> {
    if !settings.app.dashboard_dir.is_empty() {
        info!(
            configured = %settings.app.dashboard_dir,
            "[PUBLISH] dashboard_dir in config is informational; publishing to the fixed directory"
        );
    }
    let paths = publish::prepare_dashboard(store, dirs, settings.app.chart_offline)?;
    info!(entry_point = %paths.entry_point.display(), "[PUBLISH] Dashboard files ready");

    println!("Caricamento su surge.sh in corso…");
    let publisher = Publisher::new();
    let publish_dir = dirs.publish_dir.clone();
    let creds = settings.creds.clone();
    let ticket = publisher.trigger(async move {
        let locator = PathLocator;
        let runner = TokioCommandRunner;
        deploy::dispatch(&locator, &runner, &publish_dir, &creds).await
    });

    let result = ticket.wait().await;
    if result.success {
        println!("✅ Pubblicazione completata su: {}", settings.creds.domain);
        return Ok(());
    }

    let snippet = truncate_for_display(result.transcript.trim(), TRANSCRIPT_DISPLAY_LIMIT);
    let reason = match result.outcome {
        DispatchOutcome::ToolNotFound => {
            "nessuno strumento di deploy trovato (surge o npx): installa Node.js o aggiungi surge alla PATH"
        }
        _ => "tutti i tentativi di deploy sono falliti",
    };
    Err(anyhow!(
        "Pubblicazione non riuscita: {reason}.\nDettagli:\n{snippet}"
    ))
}

/// Parses a sensor value; a decimal comma is accepted.
pub fn parse_sensor_value(raw: &str, field: &str) -> Result<f64> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        bail!("Il campo '{field}' è vuoto.");
    }
    normalized
        .parse::<f64>()
        .map_err(|_| anyhow!("Il campo '{field}' deve essere un numero. Valore dato: '{raw}'"))
}

/// Operator must be non-empty after trimming; longer identifiers are cut to
/// the stored maximum.
pub fn validate_operator(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Il campo 'Operatore' non può essere vuoto.");
    }
    Ok(trimmed.chars().take(OPERATOR_MAX_LEN).collect())
}

/// Accepts ISO and Italian day-first dates, optionally with a time of day.
/// A bare date becomes start-of-day for a lower bound and end-of-day for an
/// upper bound, so intervals stay inclusive on both sides.
pub fn parse_filter_date(raw: &str, start_of_day: bool) -> Result<NaiveDateTime> {
    let s = raw.trim();

    // Two-digit-year formats come first: %Y would otherwise accept "24" as
    // the literal year 24.
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%y %H:%M:%S",
        "%d/%m/%y %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%y", "%d/%m/%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            let time = if start_of_day {
                NaiveTime::from_hms_opt(0, 0, 0)
            } else {
                NaiveTime::from_hms_opt(23, 59, 59)
            };
            let time = time.ok_or_else(|| anyhow!("invalid bound time"))?;
            return Ok(date.and_time(time));
        }
    }

    bail!("Formato data/ora non valido: '{raw}'. Usa es. 'gg/mm/aa' o 'gg/mm/aaaa' (opzionale 'HH:MM').")
}

/// Bounds a transcript for terminal display, marking the cut.
pub fn truncate_for_display(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}
