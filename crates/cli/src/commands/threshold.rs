use escalade_core::config::AppConfig;
use serde_json::json;

use super::CommandResult;

const COMMAND: &str = "threshold";

pub fn run(config: &AppConfig, tool: &str, days: u32) -> CommandResult {
    let ndays = match config.no_activity_days(tool) {
        Ok(ndays) => ndays,
        Err(error) => return CommandResult::from_config_error(COMMAND, &error),
    };

    let threshold = ndays.get(days);
    let message = match threshold {
        Some(threshold) => format!("{tool}: threshold for {days} days is {threshold}"),
        None => format!("{tool}: no range covers {days} days"),
    };

    CommandResult::success_with_data(
        COMMAND,
        message,
        Some(json!({ "tool": tool, "days": days, "threshold": threshold })),
    )
}
