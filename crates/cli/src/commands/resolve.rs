use chrono::{Datelike, Local, Weekday};
use escalade_core::config::AppConfig;
use escalade_core::errors::ApplicationError;
use escalade_core::escalation::{NamedContacts, Priority};
use escalade_core::weekday::{parse_weekday, weekday_name};
use serde_json::json;
use tracing::debug;

use super::CommandResult;

const COMMAND: &str = "resolve";

#[derive(Clone, Debug, Default)]
pub struct ResolveRequest {
    pub priority: String,
    pub days: u32,
    pub person: String,
    /// Defaults to the current local weekday.
    pub weekday: Option<String>,
    pub tool: Option<String>,
    pub variant: Option<String>,
    /// `role=person` pairs for named supervisors.
    pub contacts: Vec<String>,
}

pub fn run(config: &AppConfig, request: &ResolveRequest) -> CommandResult {
    let priority = match request.priority.parse::<Priority>() {
        Ok(priority) => priority,
        Err(other) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_argument",
                format!("unknown priority `{other}` (expected high|normal|default)"),
                3,
            )
        }
    };
    let weekday = match resolve_weekday(request.weekday.as_deref()) {
        Ok(weekday) => weekday,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_argument", message, 3),
    };
    let context = match parse_contacts(&request.contacts) {
        Ok(context) => context,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_argument", message, 3),
    };

    let escalation = match config.build_escalation(
        config.directory(),
        request.tool.as_deref(),
        request.variant.as_deref(),
    ) {
        Ok(escalation) => escalation,
        Err(error) => return CommandResult::from_config_error(COMMAND, &error),
    };

    debug!(
        event_name = "cli.resolve.query",
        priority = %priority,
        days = request.days,
        person = %request.person,
        weekday = weekday_name(weekday),
        "resolving escalation"
    );

    let supervisor =
        match escalation.get_supervisor(priority, request.days, &request.person, &context) {
            Ok(supervisor) => supervisor,
            Err(error) => {
                return CommandResult::from_application_error(
                    COMMAND,
                    ApplicationError::from(error),
                )
            }
        };
    let notify_today = escalation.filter(priority, request.days, weekday);

    let message = match (&supervisor, notify_today) {
        (Some(supervisor), Some(true)) => format!("notify {supervisor} today"),
        (Some(supervisor), _) => {
            format!("{supervisor} is next in line, but {} is not a notification day", weekday_name(weekday))
        }
        (None, _) => format!(
            "no step of the {priority} escalation covers {} days of inactivity",
            request.days
        ),
    };

    CommandResult::success_with_data(
        COMMAND,
        message,
        Some(json!({
            "priority": priority.as_str(),
            "days": request.days,
            "person": request.person,
            "weekday": weekday_name(weekday),
            "supervisor": supervisor,
            "notify_today": notify_today,
        })),
    )
}

fn resolve_weekday(raw: Option<&str>) -> Result<Weekday, String> {
    match raw {
        Some(raw) => parse_weekday(raw).map_err(|error| error.to_string()),
        None => Ok(Local::now().weekday()),
    }
}

fn parse_contacts(raw: &[String]) -> Result<NamedContacts, String> {
    raw.iter()
        .map(|pair| {
            let (role, person) = pair
                .split_once('=')
                .ok_or_else(|| format!("contact `{pair}` must look like `role=person`"))?;
            let (role, person) = (role.trim(), person.trim());
            if role.is_empty() || person.is_empty() {
                return Err(format!("contact `{pair}` must look like `role=person`"));
            }
            Ok((role.to_string(), person.to_string()))
        })
        .collect()
}
