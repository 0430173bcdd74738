use escalade_core::config::AppConfig;
use escalade_core::directory::InMemoryDirectory;
use serde::Serialize;
use serde_json::json;

use super::CommandResult;

const COMMAND: &str = "check";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct PolicyCheck {
    section: String,
    status: CheckStatus,
    hierarchical_only: Option<bool>,
    named_roles: Vec<String>,
    details: String,
}

/// Builds every configured policy table and reports, per escalation, whether
/// callers ever need to supply named contacts.
pub fn run(config: &AppConfig) -> CommandResult {
    let mut checks = Vec::new();

    for section in config.escalation_sections() {
        let (tool, variant) = split_section(&section);
        match config.build_escalation(InMemoryDirectory::default(), tool, variant) {
            Ok(escalation) => {
                let step_count = escalation_step_count(&escalation);
                checks.push(PolicyCheck {
                    section,
                    status: CheckStatus::Pass,
                    hierarchical_only: Some(escalation.is_hierarchical_escalation_only()),
                    named_roles: escalation.named_roles().into_iter().map(str::to_string).collect(),
                    details: format!("{step_count} steps loaded"),
                });
            }
            Err(error) => checks.push(PolicyCheck {
                section,
                status: CheckStatus::Fail,
                hierarchical_only: None,
                named_roles: Vec::new(),
                details: error.to_string(),
            }),
        }
    }

    for name in config.tools.iter().filter(|(_, tool)| tool.ndays.is_some()).map(|(name, _)| name) {
        let section = format!("{name}.ndays");
        match config.no_activity_days(name) {
            Ok(ndays) => checks.push(PolicyCheck {
                section,
                status: CheckStatus::Pass,
                hierarchical_only: None,
                named_roles: Vec::new(),
                details: format!("{} thresholds loaded", ndays.entries().len()),
            }),
            Err(error) => checks.push(PolicyCheck {
                section,
                status: CheckStatus::Fail,
                hierarchical_only: None,
                named_roles: Vec::new(),
                details: error.to_string(),
            }),
        }
    }

    let failures: Vec<String> = checks
        .iter()
        .filter(|check| check.status == CheckStatus::Fail)
        .map(|check| format!("{}: {}", check.section, check.details))
        .collect();
    if !failures.is_empty() {
        return CommandResult::failure(COMMAND, "policy_format", failures.join("; "), 2);
    }

    CommandResult::success_with_data(
        COMMAND,
        "check: all policy tables loaded",
        Some(json!({ "people": config.people.len(), "checks": checks })),
    )
}

fn escalation_step_count<D>(escalation: &escalade_core::Escalation<D>) -> usize
where
    D: escalade_core::PeopleDirectory,
{
    escalade_core::Priority::ALL.iter().map(|priority| escalation.steps(*priority).len()).sum()
}

/// `escalation` is the top level table; `tool.escalation-variant` a tool one.
fn split_section(section: &str) -> (Option<&str>, Option<&str>) {
    match section.split_once('.') {
        None => (None, None),
        Some((tool, key)) => (Some(tool), key.strip_prefix("escalation-")),
    }
}
