use escalade_core::config::AppConfig;
use escalade_core::escalation::Priority;
use serde_json::json;

use super::CommandResult;

const COMMAND: &str = "policy";

/// Dumps the ordered steps of one priority, or of every priority when none is
/// given.
pub fn run(
    config: &AppConfig,
    tool: Option<&str>,
    variant: Option<&str>,
    priority: Option<&str>,
) -> CommandResult {
    let priorities = match priority.map(str::parse::<Priority>).transpose() {
        Ok(Some(priority)) => vec![priority],
        Ok(None) => Priority::ALL.to_vec(),
        Err(other) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_argument",
                format!("unknown priority `{other}` (expected high|normal|default)"),
                3,
            )
        }
    };

    let escalation = match config.build_escalation(config.directory(), tool, variant) {
        Ok(escalation) => escalation,
        Err(error) => return CommandResult::from_config_error(COMMAND, &error),
    };

    let mut rendered = serde_json::Map::new();
    let mut sections = Vec::new();
    for priority in priorities {
        let steps = escalation.render(priority);
        let body = if steps.is_empty() { "<no steps>" } else { steps.as_str() };
        sections.push(format!("{priority}:\n{body}"));
        rendered.insert(
            priority.as_str().to_string(),
            json!(steps.lines().map(str::to_string).collect::<Vec<_>>()),
        );
    }

    CommandResult::success_with_data(COMMAND, sections.join("\n"), Some(json!(rendered)))
}
