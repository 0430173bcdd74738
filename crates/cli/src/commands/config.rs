use std::env;
use std::fs;
use std::path::Path;

use escalade_core::config::{resolve_config_path, AppConfig};
use toml::Value;

pub fn run(config: &AppConfig, explicit_path: Option<&Path>) -> String {
    let config_file_path = resolve_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["ESCALADE_LOGGING_LEVEL", "ESCALADE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["ESCALADE_LOGGING_FORMAT", "ESCALADE_LOG_FORMAT"]),
    ));
    lines.push(render_line(
        "policy.strict",
        &config.policy.strict.to_string(),
        source("policy.strict", &["ESCALADE_POLICY_STRICT"]),
    ));
    lines.push(render_line(
        "policy.context_roles",
        &render_list(&config.policy.context_roles),
        source("policy.context_roles", &[]),
    ));
    lines.push(render_line(
        "workflow.supervisor_skiplist",
        &render_list(&config.workflow.supervisor_skiplist),
        source("workflow.supervisor_skiplist", &["ESCALADE_SUPERVISOR_SKIPLIST"]),
    ));
    lines.push(render_line("people", &config.people.len().to_string(), source("people", &[])));
    lines.push(render_line(
        "escalation_tables",
        &render_list(&config.escalation_sections()),
        source("escalation", &[]),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_list(values: &[String]) -> String {
    if values.is_empty() {
        return "<empty>".to_string();
    }
    format!("[{}]", values.join(", "))
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
