use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::{InMemoryDirectory, PeopleDirectory, PersonRecord};
use crate::errors::PolicyError;
use crate::escalation::{parse_chains, Escalation, EscalationConfig, NoActivityDays, PolicyOptions};

pub const DEFAULT_ESCALATION_KEY: &str = "escalation";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub policy: PolicyConfig,
    pub workflow: WorkflowConfig,
    pub people: Vec<PersonRecord>,
    pub escalation: EscalationConfig,
    pub tools: BTreeMap<String, ToolConfig>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub strict: bool,
    pub context_roles: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowConfig {
    pub supervisor_skiplist: Vec<String>,
}

/// Per-tool policy tables: an optional threshold table and any number of
/// escalation tables (`escalation`, `escalation-<variant>`). Other keys are
/// tool settings kept as raw values.
#[derive(Clone, Debug, Default)]
pub struct ToolConfig {
    pub ndays: Option<BTreeMap<String, u32>>,
    pub escalations: BTreeMap<String, EscalationConfig>,
    pub settings: BTreeMap<String, toml::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub strict: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("no policy table `{0}` is configured")]
    UnknownSection(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            policy: PolicyConfig { strict: true, context_roles: Vec::new() },
            workflow: WorkflowConfig::default(),
            people: Vec::new(),
            escalation: EscalationConfig::new(),
            tools: BTreeMap::new(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("escalade.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let patch = toml::from_str::<ConfigPatch>(&interpolate_env_vars(raw)?).map_err(|source| {
            ConfigError::ParseFile { path: PathBuf::from("<inline>"), source }
        })?;
        let mut config = Self::default();
        config.apply_patch(patch)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(strict) = policy.strict {
                self.policy.strict = strict;
            }
            if let Some(context_roles) = policy.context_roles {
                self.policy.context_roles = context_roles;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(supervisor_skiplist) = workflow.supervisor_skiplist {
                self.workflow.supervisor_skiplist = supervisor_skiplist;
            }
        }

        if let Some(people) = patch.people {
            self.people = people;
        }

        if let Some(escalation) = patch.escalation {
            self.escalation = escalation;
        }

        for (name, tool) in patch.tools {
            let mut escalations = BTreeMap::new();
            let mut settings = BTreeMap::new();
            for (key, value) in tool.rest {
                if is_escalation_key(&key) {
                    let escalation = value.try_into::<EscalationConfig>().map_err(|error| {
                        ConfigError::Validation(format!("invalid table `{name}.{key}`: {error}"))
                    })?;
                    escalations.insert(key, escalation);
                } else if key.starts_with(DEFAULT_ESCALATION_KEY) {
                    return Err(ConfigError::Validation(format!(
                        "unknown table `{name}.{key}` (expected `escalation` or `escalation-<variant>`)"
                    )));
                } else {
                    settings.insert(key, value);
                }
            }
            self.tools.insert(name, ToolConfig { ndays: tool.ndays, escalations, settings });
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let log_level =
            read_env("ESCALADE_LOGGING_LEVEL").or_else(|| read_env("ESCALADE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ESCALADE_LOGGING_FORMAT").or_else(|| read_env("ESCALADE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("ESCALADE_POLICY_STRICT") {
            self.policy.strict = parse_bool("ESCALADE_POLICY_STRICT", &value)?;
        }
        if let Some(value) = read_env("ESCALADE_SUPERVISOR_SKIPLIST") {
            self.workflow.supervisor_skiplist = value
                .split(',')
                .map(str::trim)
                .filter(|mail| !mail.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(strict) = overrides.strict {
            self.policy.strict = strict;
        }
    }

    /// Checks settings and parses every policy table so that a malformed
    /// entry is reported before any query is served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_logging(&self.logging)?;
        validate_people(&self.people)?;

        let options = self.policy_options();
        parse_chains(DEFAULT_ESCALATION_KEY, &self.escalation, &options)?;
        for (name, tool) in &self.tools {
            if let Some(ndays) = &tool.ndays {
                NoActivityDays::from_config(&format!("{name}.ndays"), ndays, &options)?;
            }
            for (key, escalation) in &tool.escalations {
                parse_chains(&format!("{name}.{key}"), escalation, &options)?;
            }
        }

        Ok(())
    }

    pub fn policy_options(&self) -> PolicyOptions {
        PolicyOptions { strict: self.policy.strict, context_roles: Default::default() }
            .with_context_roles(self.policy.context_roles.iter().cloned())
    }

    pub fn directory(&self) -> InMemoryDirectory {
        InMemoryDirectory::new(self.people.clone())
    }

    /// Names of every escalation table, as `escalation` or `<tool>.<key>`.
    pub fn escalation_sections(&self) -> Vec<String> {
        let mut sections = vec![DEFAULT_ESCALATION_KEY.to_string()];
        for (name, tool) in &self.tools {
            sections.extend(tool.escalations.keys().map(|key| format!("{name}.{key}")));
        }
        sections
    }

    /// Looks up an escalation table. Without a tool this is the top level
    /// `escalation` table; with a tool it is `<tool>.escalation` or
    /// `<tool>.escalation-<variant>`.
    pub fn escalation_config(
        &self,
        tool: Option<&str>,
        variant: Option<&str>,
    ) -> Result<(String, &EscalationConfig), ConfigError> {
        let key = match variant {
            Some(variant) => format!("{DEFAULT_ESCALATION_KEY}-{variant}"),
            None => DEFAULT_ESCALATION_KEY.to_string(),
        };

        match tool {
            None if variant.is_none() => Ok((key, &self.escalation)),
            None => Err(ConfigError::UnknownSection(key)),
            Some(name) => {
                let section = format!("{name}.{key}");
                match self.tools.get(name).and_then(|tool| tool.escalations.get(&key)) {
                    Some(config) => Ok((section, config)),
                    None => Err(ConfigError::UnknownSection(section)),
                }
            }
        }
    }

    pub fn build_escalation<D>(
        &self,
        directory: D,
        tool: Option<&str>,
        variant: Option<&str>,
    ) -> Result<Escalation<D>, ConfigError>
    where
        D: PeopleDirectory,
    {
        let (section, config) = self.escalation_config(tool, variant)?;
        let escalation =
            Escalation::from_config(directory, &section, config, &self.policy_options())?;
        Ok(escalation.with_skiplist(self.workflow.supervisor_skiplist.iter().cloned()))
    }

    pub fn no_activity_days(&self, tool: &str) -> Result<NoActivityDays, ConfigError> {
        let section = format!("{tool}.ndays");
        let ndays = self
            .tools
            .get(tool)
            .and_then(|tool| tool.ndays.as_ref())
            .ok_or_else(|| ConfigError::UnknownSection(section.clone()))?;
        Ok(NoActivityDays::from_config(&section, ndays, &self.policy_options())?)
    }
}

fn is_escalation_key(key: &str) -> bool {
    key == DEFAULT_ESCALATION_KEY
        || key
            .strip_prefix(DEFAULT_ESCALATION_KEY)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|variant| !variant.is_empty())
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("escalade.toml"), PathBuf::from("config/escalade.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_people(people: &[PersonRecord]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for person in people {
        let id = person.id.trim().to_ascii_lowercase();
        if id.is_empty() {
            return Err(ConfigError::Validation("people[].id must not be empty".to_string()));
        }
        if !seen.insert(id) {
            return Err(ConfigError::Validation(format!(
                "people[].id `{}` is declared more than once",
                person.id
            )));
        }
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    logging: Option<LoggingPatch>,
    policy: Option<PolicyPatch>,
    workflow: Option<WorkflowPatch>,
    people: Option<Vec<PersonRecord>>,
    escalation: Option<EscalationConfig>,
    #[serde(flatten)]
    tools: BTreeMap<String, ToolPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    strict: Option<bool>,
    context_roles: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    supervisor_skiplist: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolPatch {
    ndays: Option<BTreeMap<String, u32>>,
    #[serde(flatten)]
    rest: BTreeMap<String, toml::Value>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use chrono::Weekday;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::errors::PolicyError;
    use crate::escalation::{NamedContacts, Priority};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const POLICY: &str = r#"
[policy]
context_roles = ["triage_owner"]

[workflow]
supervisor_skiplist = ["dana@example.com"]

[[people]]
id = "alice"
mail = "alice@example.com"
manager = "bob"

[[people]]
id = "bob"
mail = "bob@example.com"
manager = "carol"
title = "manager"

[[people]]
id = "carol"
mail = "carol@example.com"
manager = "dana"
title = "director"

[[people]]
id = "dana"
mail = "dana@example.com"
title = "vp"

[escalation.high."[0;3["]
supervisor = "n+1"
days = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]

[escalation.high."[3;+∞["]
supervisor = "director"
days = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]

[escalation.normal."[0;+∞["]
supervisor = "vp"
days = ["Monday"]

[no_severity.ndays]
"[0;7[" = 0
"[7;14[" = 1
"[14;+∞[" = 2

[no_severity."escalation-first".default."[0;+∞["]
supervisor = "triage_owner"
days = ["Monday", "Thursday"]
"#;

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn parses_escalation_thresholds_and_people() -> Result<(), String> {
        let config = AppConfig::from_toml_str(POLICY).map_err(|err| err.to_string())?;

        ensure(config.people.len() == 4, "all people should be loaded")?;
        ensure(config.tools.contains_key("no_severity"), "tool section should be loaded")?;
        ensure(
            config.escalation_sections()
                == vec!["escalation".to_string(), "no_severity.escalation-first".to_string()],
            "escalation sections should list top level and tool tables",
        )?;

        let ndays = config.no_activity_days("no_severity").map_err(|err| err.to_string())?;
        ensure(ndays.get(10) == Some(1), "10 days falls in the second threshold")?;
        ensure(ndays.get(20) == Some(2), "20 days falls in the last threshold")?;
        Ok(())
    }

    #[test]
    fn builds_escalation_with_shared_skiplist() -> Result<(), String> {
        let config = AppConfig::from_toml_str(POLICY).map_err(|err| err.to_string())?;
        let escalation =
            config.build_escalation(config.directory(), None, None).map_err(|err| err.to_string())?;

        let context = NamedContacts::new();
        ensure(
            escalation.get_supervisor(Priority::High, 1, "alice", &context)
                == Ok(Some("bob@example.com".to_string())),
            "first step resolves the direct manager",
        )?;
        ensure(
            escalation.get_supervisor(Priority::High, 5, "alice", &context)
                == Ok(Some("carol@example.com".to_string())),
            "second step resolves the director",
        )?;
        // dana is skiplisted, so the vp step falls back to the direct manager
        ensure(
            escalation.get_supervisor(Priority::Normal, 5, "alice", &context)
                == Ok(Some("bob@example.com".to_string())),
            "skiplisted vp should fall back to the direct manager",
        )?;
        ensure(escalation.filter(Priority::Normal, 5, Weekday::Tue) == Some(false), "tuesday is off")?;
        ensure(escalation.is_hierarchical_escalation_only(), "top level escalation is hierarchical")
    }

    #[test]
    fn builds_tool_escalation_variants() -> Result<(), String> {
        let config = AppConfig::from_toml_str(POLICY).map_err(|err| err.to_string())?;
        let escalation = config
            .build_escalation(config.directory(), Some("no_severity"), Some("first"))
            .map_err(|err| err.to_string())?;

        ensure(!escalation.is_hierarchical_escalation_only(), "named role makes it non hierarchical")?;
        ensure(
            escalation.get_supervisor(
                Priority::Default,
                3,
                "alice",
                &NamedContacts::new().with("triage_owner", "carol"),
            ) == Ok(Some("carol@example.com".to_string())),
            "named role should resolve through the supplied contact",
        )?;

        let missing = config.build_escalation(config.directory(), Some("no_severity"), Some("second"));
        ensure(
            matches!(missing, Err(ConfigError::UnknownSection(ref section)) if section == "no_severity.escalation-second"),
            "missing variant should be reported by name",
        )
    }

    #[test]
    fn malformed_policy_fails_at_load_time() {
        let raw = r#"
[escalation.high."[0;3]"]
supervisor = "n+1"
days = ["Monday"]
"#;

        let error = AppConfig::from_toml_str(raw).expect_err("malformed range must fail");
        assert!(matches!(error, ConfigError::Policy(PolicyError::Range { .. })));
    }

    #[test]
    fn lenient_policy_drops_malformed_entries() {
        let raw = r#"
[policy]
strict = false

[escalation.high."[0;3]"]
supervisor = "n+1"
days = ["Monday"]

[escalation.high."[3;+∞["]
supervisor = "director"
days = ["Monday"]
"#;

        let config = AppConfig::from_toml_str(raw).expect("lenient policy loads");
        let escalation =
            config.build_escalation(config.directory(), None, None).expect("escalation builds");
        assert_eq!(escalation.steps(Priority::High).len(), 1);
    }

    #[test]
    fn named_role_must_be_declared() {
        let raw = r#"
[escalation.high."[0;+∞["]
supervisor = "triage_owner"
days = ["Monday"]
"#;

        let error = AppConfig::from_toml_str(raw).expect_err("undeclared role must fail");
        assert!(matches!(error, ConfigError::Policy(PolicyError::UndeclaredRole { .. })));
    }

    #[test]
    fn unknown_tool_table_is_rejected() {
        let raw = r#"
[no_severity.escalations.high."[0;+∞["]
supervisor = "vp"
days = ["Monday"]
"#;

        let error = AppConfig::from_toml_str(raw).expect_err("unknown table must fail");
        assert!(
            matches!(error, ConfigError::Validation(ref message) if message.contains("no_severity.escalations"))
        );
    }

    #[test]
    fn tool_settings_sit_next_to_policy_tables() -> Result<(), String> {
        let raw = r#"
[no_severity]
first-step = 2
second-step = 4
days_lookup = 7

[no_severity.ndays]
"[0;7[" = 0
"[7;+∞[" = 1

[no_severity.escalation.high."[0;+∞["]
supervisor = "n+1"
days = ["Monday"]
"#;

        let config = AppConfig::from_toml_str(raw).map_err(|err| err.to_string())?;
        let tool = config.tools.get("no_severity").ok_or("tool section should be loaded")?;

        ensure(tool.settings.get("first-step") == Some(&toml::Value::Integer(2)), "scalar kept")?;
        ensure(tool.settings.len() == 3, "every scalar setting should be kept")?;
        ensure(tool.escalations.len() == 1, "only escalation tables are policy")?;
        ensure(
            config.no_activity_days("no_severity").map_err(|err| err.to_string())?.get(9) == Some(1),
            "threshold table should still load",
        )
    }

    #[test]
    fn step_without_days_is_rejected() {
        let raw = r#"
[escalation.high."[0;+∞["]
supervisor = "n+1"
"#;

        let error = AppConfig::from_toml_str(raw).expect_err("missing days must fail");
        assert!(matches!(error, ConfigError::ParseFile { .. }));
    }

    #[test]
    fn duplicate_people_are_rejected() {
        let raw = r#"
[[people]]
id = "alice"
mail = "alice@example.com"

[[people]]
id = "Alice"
mail = "alice2@example.com"
"#;

        let error = AppConfig::from_toml_str(raw).expect_err("duplicate id must fail");
        assert!(matches!(error, ConfigError::Validation(ref message) if message.contains("Alice")));
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ESCALADE_SKIPPED", "away@example.com");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("escalade.toml");
            fs::write(
                &path,
                r#"
[workflow]
supervisor_skiplist = ["${TEST_ESCALADE_SKIPPED}"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.workflow.supervisor_skiplist == vec!["away@example.com".to_string()],
                "skiplist should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_ESCALADE_SKIPPED"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ESCALADE_LOG_FORMAT", "json");
        env::set_var("ESCALADE_POLICY_STRICT", "false");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("escalade.toml");
            fs::write(
                &path,
                r#"
[logging]
level = "warn"
format = "pretty"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(config.logging.format == LogFormat::Json, "env log format should win over file")?;
            ensure(!config.policy.strict, "env strictness should win over default")
        })();

        clear_vars(&["ESCALADE_LOG_FORMAT", "ESCALADE_POLICY_STRICT"]);
        result
    }

    #[test]
    fn invalid_env_override_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ESCALADE_POLICY_STRICT", "sometimes");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected env override failure but config load succeeded".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "ESCALADE_POLICY_STRICT"),
                "failure should name the offending variable",
            ),
        };

        clear_vars(&["ESCALADE_POLICY_STRICT"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(ref missing)) if *missing == path),
            "missing file should be reported with its path",
        )
    }
}
