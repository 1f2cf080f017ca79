//! Command-line front end for the patient registry.
//!
//! # Responsibility
//! - Exercise the core persistence API from a terminal.
//! - Print results as JSON so output can be piped into other tools.

use clap::{Parser, Subcommand};
use log::error;
use once_cell::sync::Lazy;
use patreg_core::{
    default_log_level, init_logging, sort_patients, startup, ConnectionManager, DbConfig,
    PatientDraft, PatientService, ReadinessSignal, SortKey, SortOrder, SqlValue,
    SqlitePatientRepository,
};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("valid phone regex"));

#[derive(Debug, Parser)]
#[command(name = "patreg", version, about = "Patient registry over an embedded database")]
struct Cli {
    /// Database file; defaults to PATREG_DB_PATH or an in-memory database.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage info.
    Ping,
    /// List all patients.
    List {
        #[arg(long, default_value = "lastName")]
        sort: SortKey,
        #[arg(long)]
        desc: bool,
    },
    /// Search patients by first or last name.
    Search { term: String },
    /// Register one patient.
    Add {
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(long)]
        dob: String,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        history: Option<String>,
    },
    /// Delete one patient by id.
    Delete { id: i64 },
    /// Run one SQL statement; extra arguments bind to ?1, ?2, ...
    Query { sql: String, params: Vec<String> },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    if let Command::Ping = cli.command {
        println!("patreg_core ping={}", patreg_core::ping());
        println!("patreg_core version={}", patreg_core::core_version());
        return ExitCode::SUCCESS;
    }

    let config = match cli.db.clone() {
        Some(path) => DbConfig::file(path),
        None => DbConfig::from_env(),
    };
    let manager = ConnectionManager::new(config);
    let status = startup(&manager, ReadinessSignal::global()).await;
    if !status.ready {
        eprintln!("{}", status.message.unwrap_or_default());
        return ExitCode::FAILURE;
    }

    match run(cli.command, manager).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, manager: ConnectionManager) -> Result<(), String> {
    let service = PatientService::new(SqlitePatientRepository::new(manager.clone()));

    match command {
        Command::Ping => Ok(()),
        Command::List { sort, desc } => {
            let mut patients = service.list_all().await.map_err(|err| err.to_string())?;
            let order = if desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            sort_patients(&mut patients, sort, order);
            print_json(&patients)
        }
        Command::Search { term } => {
            let patients = service
                .search_or_list(&term)
                .await
                .map_err(|err| err.to_string())?;
            print_json(&patients)
        }
        Command::Add {
            first,
            last,
            dob,
            gender,
            email,
            phone,
            address,
            history,
        } => {
            let draft = PatientDraft {
                email,
                phone,
                address,
                medical_history: history,
                ..PatientDraft::new(first, last, dob, gender)
            };
            let problems = registration_errors(&draft);
            if !problems.is_empty() {
                return Err(problems.join("; "));
            }
            let id = service.create(&draft).await.map_err(|err| err.to_string())?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::Delete { id } => match service.delete(id).await {
            Ok(Some(deleted)) => print_json(&serde_json::json!({ "deleted": deleted })),
            Ok(None) => Err(format!("patient {id} not found")),
            Err(err) => Err(err.to_string()),
        },
        Command::Query { sql, params } => {
            let params = params.into_iter().map(parse_param).collect::<Vec<_>>();
            let outcome = manager.execute(sql, params).await;
            print_json(&outcome)?;
            if outcome.success {
                Ok(())
            } else {
                Err(outcome.error_message.unwrap_or_default())
            }
        }
    }
}

/// Registration form checks; the repository itself stores whatever it is given.
fn registration_errors(draft: &PatientDraft) -> Vec<String> {
    let mut problems = Vec::new();
    let missing = draft.missing_required_fields();
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|field| field.column())
            .collect::<Vec<_>>()
            .join(", ");
        problems.push(format!("missing required fields: {names}"));
    }
    if let Some(email) = draft.email.as_deref().filter(|value| !value.is_empty()) {
        if !EMAIL_RE.is_match(email) {
            problems.push("email pattern is wrong".to_string());
        }
    }
    if let Some(phone) = draft.phone.as_deref().filter(|value| !value.is_empty()) {
        if !PHONE_RE.is_match(phone) {
            problems.push("phone number must be exactly 10 digits".to_string());
        }
    }
    problems
}

fn parse_param(raw: String) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        return SqlValue::Null;
    }
    match raw.parse::<i64>() {
        Ok(value) => SqlValue::Integer(value),
        Err(_) => SqlValue::Text(raw),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_param, registration_errors, Cli};
    use clap::CommandFactory;
    use patreg_core::{PatientDraft, SqlValue};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn params_bind_as_integers_text_or_null() {
        assert_eq!(parse_param("42".to_string()), SqlValue::Integer(42));
        assert_eq!(parse_param("NULL".to_string()), SqlValue::Null);
        assert_eq!(
            parse_param("Lee".to_string()),
            SqlValue::Text("Lee".to_string())
        );
    }

    #[test]
    fn registration_accepts_well_formed_contact_details() {
        let draft = PatientDraft::new("Ann", "Lee", "1990-01-01", "female")
            .with_email("ann@example.com")
            .with_phone("5550001111");
        assert!(registration_errors(&draft).is_empty());
        assert!(registration_errors(&draft.clone().with_email("")).is_empty());
    }

    #[test]
    fn registration_rejects_malformed_email_and_phone() {
        let draft = PatientDraft::new("Ann", "Lee", "1990-01-01", "female")
            .with_email("ann@example")
            .with_phone("555-000-1111");
        assert_eq!(
            registration_errors(&draft),
            vec![
                "email pattern is wrong".to_string(),
                "phone number must be exactly 10 digits".to_string(),
            ]
        );
    }

    #[test]
    fn registration_reports_missing_required_fields() {
        let draft = PatientDraft::new(" ", "Lee", "1990-01-01", "");
        let problems = registration_errors(&draft);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("firstName"));
        assert!(problems[0].contains("gender"));
    }
}
