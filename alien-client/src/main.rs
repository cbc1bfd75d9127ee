//! Alien Portal command-line entry point.
//!
//! Restores or opens a session, refreshes the project cache and prints the
//! filtered, sorted project list.

use alien_client::logging::init_tracing;
use alien_client::{ClientError, PortalClient, PortalConfig};
use alien_core::checklist;
use alien_core::{
    Blocker, FilterState, NotificationLevel, ProjectRecord, SortDirection, SortKind, SortSpec,
    ValidationError, NAME_FIELD,
};
use serde_json::Value;
use tracing::info;

const EMAIL_ENV_VAR: &str = "ALIEN_PORTAL_EMAIL";
const PASSWORD_ENV_VAR: &str = "ALIEN_PORTAL_PASSWORD";

#[derive(Debug, Default)]
struct CliArgs {
    refresh: bool,
    filter: FilterState,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = PortalConfig::load()?;
    init_tracing(&config)?;
    let args = parse_args(std::env::args().skip(1))?;

    let client = PortalClient::new(&config)?;
    let session = client.session();
    let user = match session.restore().await? {
        Some(user) => user,
        None => {
            let (email, password) = credentials_from_env()?;
            session.login(&email, &password).await?
        }
    };
    let theme = client.theme().current()?;
    info!(user = %user.label(), role = %user.role, %theme, "Session ready");

    let refreshed = client.projects().refresh(args.refresh).await?;
    info!(outcome = ?refreshed.outcome, cached = refreshed.envelope.len(), "Projects loaded");

    let rows = client.projects().view(&args.filter).await;
    print_rows(&rows);
    eprintln!(
        "{} of {} projects shown ({} active filters)",
        rows.len(),
        refreshed.envelope.len(),
        args.filter.active_filter_count()
    );

    for notification in client.notifications().drain() {
        let label = match notification.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "ok",
            NotificationLevel::Warning => "warn",
            NotificationLevel::Error => "error",
        };
        eprintln!("[{}] {}", label, notification.message);
    }
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, ValidationError> {
    let mut parsed = CliArgs::default();
    let mut sort: Option<SortSpec> = None;
    let mut descending = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                // Consumed by PortalConfig::load.
                args.next();
            }
            "--refresh" => parsed.refresh = true,
            "--desc" => descending = true,
            "--search" => parsed.filter.search_term = required_value(&mut args, "--search")?,
            "--sort" => sort = Some(parse_sort(&required_value(&mut args, "--sort")?)?),
            "--filter" => {
                let raw = required_value(&mut args, "--filter")?;
                let (field, value) = raw.split_once('=').ok_or_else(|| {
                    ValidationError::InvalidValue {
                        field: "--filter".to_string(),
                        reason: format!("expected field=value, got '{}'", raw),
                    }
                })?;
                parsed
                    .filter
                    .field_filters
                    .insert(field.trim().to_string(), parse_filter_value(value.trim()));
            }
            other => {
                return Err(ValidationError::InvalidValue {
                    field: "arguments".to_string(),
                    reason: format!("unknown argument '{}'", other),
                })
            }
        }
    }

    let mut sort = sort.unwrap_or_else(SortSpec::last_updated);
    if descending {
        sort.direction = SortDirection::Desc;
    }
    parsed.filter.sort = Some(sort);
    Ok(parsed)
}

fn required_value(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<String, ValidationError> {
    args.next().ok_or_else(|| ValidationError::RequiredFieldMissing {
        field: flag.to_string(),
    })
}

/// `field` or `field:kind`, ascending unless `--desc` is given.
fn parse_sort(raw: &str) -> Result<SortSpec, ValidationError> {
    let (key, kind) = match raw.split_once(':') {
        Some((key, kind)) => (key, kind.parse::<SortKind>()?),
        None => (raw, SortKind::Text),
    };
    if key.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "--sort".to_string(),
        });
    }
    Ok(SortSpec::new(key.trim(), kind, SortDirection::Asc))
}

/// Booleans and numbers compare as JSON values, anything else as a string.
fn parse_filter_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn credentials_from_env() -> Result<(String, String), ValidationError> {
    let read = |key: &str| {
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: key.to_string(),
            })
    };
    Ok((read(EMAIL_ENV_VAR)?, read(PASSWORD_ENV_VAR)?))
}

/// Onboarding progress as a whole percentage.
fn checklist_label(row: &ProjectRecord) -> String {
    format!("{:.0}%", checklist::progress(row.get("checklist")) * 100.0)
}

fn print_rows(rows: &[ProjectRecord]) {
    println!(
        "{:<12} {:<32} {:<20} {:<22} {:<10} BLOCKER",
        "ID", "NAME", "STATUS", "LAST ACTIVE", "CHECKLIST"
    );
    for row in rows {
        let status = row
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("-");
        let last_active = row
            .lookup("stats.last_active")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "-".to_string());
        let blocker = Blocker::parse(row.get("blocker").and_then(Value::as_str));
        println!(
            "{:<12} {:<32} {:<20} {:<22} {:<10} {}",
            row.id,
            row.get(NAME_FIELD).and_then(Value::as_str).unwrap_or("-"),
            status,
            last_active,
            checklist_label(row),
            blocker
        );
    }
}
