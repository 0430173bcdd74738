pub mod no_activity;
pub mod range;
pub mod step;
pub mod supervisor;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audit::AuditSink;
use crate::directory::PeopleDirectory;
use crate::errors::{PolicyError, ResolutionError};
use crate::weekday::WeekdaySet;

pub use no_activity::NoActivityDays;
pub use range::{Range, RangeParseError};
pub use step::Step;
pub use supervisor::{NamedContacts, Supervisor, SupervisorParseError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Default,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Default => "default",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "default" => Ok(Self::Default),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw form of a step as written in the policy file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub supervisor: String,
    pub days: Vec<String>,
}

/// `priority -> range -> step`, as written in the policy file.
pub type EscalationConfig = BTreeMap<String, BTreeMap<String, StepConfig>>;

/// How malformed policy entries are handled while building rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyOptions {
    /// Reject the whole policy on the first malformed entry. When false the
    /// entry is dropped with a warning.
    pub strict: bool,
    /// Named supervisor tags that callers promise to supply as context.
    pub context_roles: BTreeSet<String>,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self { strict: true, context_roles: BTreeSet::new() }
    }
}

impl PolicyOptions {
    pub fn lenient() -> Self {
        Self { strict: false, ..Self::default() }
    }

    pub fn with_context_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Applies the strictness policy to a single entry.
    pub(crate) fn admit<T>(&self, entry: Result<T, PolicyError>) -> Result<Option<T>, PolicyError> {
        match entry {
            Ok(value) => Ok(Some(value)),
            Err(error) if self.strict => Err(error),
            Err(error) => {
                warn!(
                    event_name = "policy.entry_dropped",
                    location = error.location(),
                    error = %error,
                    "dropping malformed policy entry"
                );
                Ok(None)
            }
        }
    }
}

/// Per-priority escalation chains sharing one directory and one skiplist.
pub struct Escalation<D> {
    directory: D,
    steps: BTreeMap<Priority, Vec<Step>>,
    skiplist: BTreeSet<String>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<D> Escalation<D>
where
    D: PeopleDirectory,
{
    /// Builds the chains from `config`. `section` names the policy table the
    /// entries came from and only shows up in error messages.
    pub fn from_config(
        directory: D,
        section: &str,
        config: &EscalationConfig,
        options: &PolicyOptions,
    ) -> Result<Self, PolicyError> {
        Ok(Self::from_steps(directory, parse_chains(section, config, options)?))
    }

    pub fn from_steps(directory: D, steps: BTreeMap<Priority, Vec<Step>>) -> Self {
        let mut all: BTreeMap<Priority, Vec<Step>> =
            Priority::ALL.into_iter().map(|priority| (priority, Vec::new())).collect();
        for (priority, mut chain) in steps {
            chain.sort_by_key(Step::lower_bound);
            all.insert(priority, chain);
        }

        Self { directory, steps: all, skiplist: BTreeSet::new(), audit: None }
    }

    pub fn with_skiplist<I, S>(mut self, skiplist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skiplist = skiplist.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn skiplist(&self) -> &BTreeSet<String> {
        &self.skiplist
    }

    pub fn steps(&self, priority: Priority) -> &[Step] {
        self.steps.get(&priority).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Contact to notify about `person` after `days` of inactivity, or `None`
    /// when no step of `priority` covers `days`.
    pub fn get_supervisor(
        &self,
        priority: Priority,
        days: u32,
        person: &str,
        context: &NamedContacts,
    ) -> Result<Option<String>, ResolutionError> {
        let audit = self.audit.as_deref();
        for step in self.steps(priority) {
            if let Some(resolved) =
                step.get_supervisor(days, &self.directory, person, &self.skiplist, context, audit)
            {
                return resolved.map(Some);
            }
        }
        Ok(None)
    }

    /// Whether `weekday` is a notification day, or `None` when no step of
    /// `priority` covers `days`.
    pub fn filter(&self, priority: Priority, days: u32, weekday: Weekday) -> Option<bool> {
        self.steps(priority).iter().find_map(|step| step.filter(days, weekday))
    }

    /// True when no step needs a named contact supplied by the caller.
    pub fn is_hierarchical_escalation_only(&self) -> bool {
        self.steps.values().flatten().all(|step| step.supervisor.is_hierarchical())
    }

    /// Named roles the caller must be ready to supply.
    pub fn named_roles(&self) -> BTreeSet<&str> {
        self.steps.values().flatten().filter_map(|step| step.supervisor.named_role()).collect()
    }

    pub fn render(&self, priority: Priority) -> String {
        self.steps(priority).iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    }
}

impl<D> fmt::Debug for Escalation<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Escalation")
            .field("steps", &self.steps)
            .field("skiplist", &self.skiplist)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

/// Parses every priority of `config` into steps sorted by lower bound.
pub fn parse_chains(
    section: &str,
    config: &EscalationConfig,
    options: &PolicyOptions,
) -> Result<BTreeMap<Priority, Vec<Step>>, PolicyError> {
    let mut steps: BTreeMap<Priority, Vec<Step>> = BTreeMap::new();

    for (priority_key, entries) in config {
        let location = format!("{section}.{priority_key}");
        let priority = priority_key.parse::<Priority>().map_err(|priority| {
            PolicyError::UnknownPriority { location: location.clone(), priority }
        });
        let Some(priority) = options.admit(priority)? else {
            continue;
        };

        let chain = steps.entry(priority).or_default();
        for (range_key, entry) in entries {
            let location = format!("{location}.\"{range_key}\"");
            if let Some(step) = options.admit(parse_step(&location, range_key, entry, options))? {
                chain.push(step);
            }
        }
    }

    Ok(steps)
}

fn parse_step(
    location: &str,
    range_key: &str,
    entry: &StepConfig,
    options: &PolicyOptions,
) -> Result<Step, PolicyError> {
    let range = range_key
        .parse::<Range>()
        .map_err(|source| PolicyError::Range { location: location.to_string(), source })?;
    let supervisor = entry
        .supervisor
        .parse::<Supervisor>()
        .map_err(|source| PolicyError::Supervisor { location: location.to_string(), source })?;
    if let Some(role) = supervisor.named_role() {
        if !options.context_roles.contains(role) {
            return Err(PolicyError::UndeclaredRole {
                location: location.to_string(),
                role: role.to_string(),
            });
        }
    }
    let days = WeekdaySet::parse_names(&entry.days)
        .map_err(|source| PolicyError::Weekday { location: location.to_string(), source })?;

    Ok(Step::new(range, supervisor, days))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Weekday;
    use proptest::prelude::*;

    use crate::audit::InMemoryAuditSink;
    use crate::directory::tests::org_chart;
    use crate::directory::InMemoryDirectory;
    use crate::errors::{PolicyError, ResolutionError};

    use super::{
        Escalation, EscalationConfig, NamedContacts, PolicyOptions, Priority, StepConfig,
    };

    const WORKWEEK: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

    fn step(supervisor: &str, days: &[&str]) -> StepConfig {
        StepConfig {
            supervisor: supervisor.to_string(),
            days: days.iter().map(|day| day.to_string()).collect(),
        }
    }

    fn chain(entries: &[(&str, StepConfig)]) -> BTreeMap<String, StepConfig> {
        entries.iter().map(|(range, step)| (range.to_string(), step.clone())).collect()
    }

    fn high_priority_config() -> EscalationConfig {
        BTreeMap::from([(
            "high".to_string(),
            chain(&[
                ("[3;+∞[", step("director", &WORKWEEK)),
                ("[0;3[", step("n+1", &WORKWEEK)),
            ]),
        )])
    }

    fn escalation(config: &EscalationConfig) -> Escalation<InMemoryDirectory> {
        Escalation::from_config(org_chart(), "escalation", config, &PolicyOptions::default())
            .expect("valid policy")
    }

    #[test]
    fn steps_are_sorted_by_lower_bound() {
        let escalation = escalation(&high_priority_config());

        let lowers: Vec<u32> =
            escalation.steps(Priority::High).iter().map(|step| step.range.lower()).collect();
        assert_eq!(lowers, vec![0, 3]);
        assert!(escalation.steps(Priority::Normal).is_empty());
        assert!(escalation.steps(Priority::Default).is_empty());
    }

    #[test]
    fn first_matching_step_picks_the_supervisor() {
        let escalation = escalation(&high_priority_config());
        let context = NamedContacts::new();

        assert_eq!(
            escalation.get_supervisor(Priority::High, 1, "alice", &context),
            Ok(Some("bob@example.com".to_string()))
        );
        assert_eq!(
            escalation.get_supervisor(Priority::High, 5, "alice", &context),
            Ok(Some("carol@example.com".to_string()))
        );
        assert_eq!(escalation.get_supervisor(Priority::Normal, 5, "alice", &context), Ok(None));
    }

    #[test]
    fn shared_escalation_answers_concurrent_queries() {
        let escalation = Arc::new(escalation(&high_priority_config()));

        std::thread::scope(|scope| {
            for days in 0..8u32 {
                let escalation = Arc::clone(&escalation);
                scope.spawn(move || {
                    let expected = if days < 3 { "bob@example.com" } else { "carol@example.com" };
                    assert_eq!(
                        escalation.get_supervisor(Priority::High, days, "alice", &NamedContacts::new()),
                        Ok(Some(expected.to_string()))
                    );
                    assert_eq!(escalation.filter(Priority::High, days, Weekday::Sun), Some(false));
                });
            }
        });
    }

    #[test]
    fn filter_returns_none_when_no_range_covers_the_days() {
        let config = BTreeMap::from([(
            "normal".to_string(),
            chain(&[("[0;30[", step("n+1", &["Sunday"]))]),
        )]);
        let escalation = escalation(&config);

        assert_eq!(escalation.filter(Priority::Normal, 100, Weekday::Sun), None);
        assert_eq!(escalation.filter(Priority::Normal, 10, Weekday::Sun), Some(true));
        assert_eq!(escalation.filter(Priority::Normal, 10, Weekday::Mon), Some(false));
    }

    #[test]
    fn overlapping_later_steps_are_never_reached() {
        let config = BTreeMap::from([(
            "default".to_string(),
            chain(&[("[0;10[", step("n+1", &["Monday"])), ("[5;+∞[", step("vp", &["Sunday"]))]),
        )]);
        let escalation = escalation(&config);

        assert_eq!(escalation.filter(Priority::Default, 7, Weekday::Mon), Some(true));
        assert_eq!(
            escalation.get_supervisor(Priority::Default, 7, "alice", &NamedContacts::new()),
            Ok(Some("bob@example.com".to_string()))
        );
    }

    #[test]
    fn skiplist_applies_to_every_resolution() {
        let escalation = escalation(&high_priority_config()).with_skiplist(["carol@example.com"]);

        assert_eq!(
            escalation.get_supervisor(Priority::High, 5, "alice", &NamedContacts::new()),
            Ok(Some("bob@example.com".to_string()))
        );
    }

    #[test]
    fn degraded_resolution_reaches_the_audit_sink() {
        let sink = InMemoryAuditSink::default();
        let escalation =
            escalation(&high_priority_config()).with_audit_sink(Arc::new(sink.clone()));

        assert_eq!(
            escalation.get_supervisor(Priority::High, 5, "eve", &NamedContacts::new()),
            Ok(Some("eve@example.com".to_string()))
        );
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn hierarchical_only_requires_every_step_to_be_a_position() {
        assert!(escalation(&high_priority_config()).is_hierarchical_escalation_only());

        let mut config = high_priority_config();
        config.insert(
            "normal".to_string(),
            chain(&[("[0;+∞[", step("triage_owner", &WORKWEEK))]),
        );
        let options = PolicyOptions::default().with_context_roles(["triage_owner"]);
        let escalation = Escalation::from_config(org_chart(), "escalation", &config, &options)
            .expect("declared role is accepted");

        assert!(!escalation.is_hierarchical_escalation_only());
        assert_eq!(escalation.named_roles().into_iter().collect::<Vec<_>>(), vec!["triage_owner"]);
        assert_eq!(
            escalation.get_supervisor(Priority::Normal, 2, "alice", &NamedContacts::new()),
            Err(ResolutionError::MissingNamedContact { role: "triage_owner".to_string() })
        );
        assert_eq!(
            escalation.get_supervisor(
                Priority::Normal,
                2,
                "alice",
                &NamedContacts::new().with("triage_owner", "dana"),
            ),
            Ok(Some("dana@example.com".to_string()))
        );
    }

    #[test]
    fn undeclared_named_role_fails_at_load_time() {
        let config = BTreeMap::from([(
            "high".to_string(),
            chain(&[("[0;+∞[", step("triage_owner", &WORKWEEK))]),
        )]);

        let error = Escalation::from_config(org_chart(), "to_triage.escalation", &config, &PolicyOptions::default())
            .expect_err("undeclared role must be rejected");

        assert!(matches!(
            error,
            PolicyError::UndeclaredRole { ref location, ref role }
                if location == "to_triage.escalation.high.\"[0;+∞[\"" && role == "triage_owner"
        ));
    }

    #[test]
    fn malformed_entries_are_fatal_when_strict() {
        let config = BTreeMap::from([(
            "high".to_string(),
            chain(&[("[0;3]", step("n+1", &WORKWEEK)), ("[3;+∞[", step("director", &WORKWEEK))]),
        )]);

        let error = Escalation::from_config(org_chart(), "escalation", &config, &PolicyOptions::default())
            .expect_err("malformed range must be rejected");

        assert!(matches!(error, PolicyError::Range { .. }));
    }

    #[test]
    fn malformed_entries_are_dropped_when_lenient() {
        let config = BTreeMap::from([
            (
                "high".to_string(),
                chain(&[
                    ("[0;3]", step("n+1", &WORKWEEK)),
                    ("[3;+∞[", step("director", &WORKWEEK)),
                    ("[1;2[", step("vp", &["Caturday"])),
                ]),
            ),
            ("urgent".to_string(), chain(&[("[0;+∞[", step("vp", &WORKWEEK))])),
        ]);

        let escalation =
            Escalation::from_config(org_chart(), "escalation", &config, &PolicyOptions::lenient())
                .expect("lenient load keeps valid entries");

        assert_eq!(escalation.steps(Priority::High).len(), 1);
        assert_eq!(escalation.render(Priority::High), "[3;+∞[ => supervisor: director, days: [Monday, Tuesday, Wednesday, Thursday, Friday]");
    }

    #[test]
    fn unknown_priority_is_rejected_when_strict() {
        let config = BTreeMap::from([("urgent".to_string(), chain(&[("[0;+∞[", step("vp", &WORKWEEK))]))]);

        let error = Escalation::from_config(org_chart(), "escalation", &config, &PolicyOptions::default())
            .expect_err("unknown priority must be rejected");

        assert_eq!(
            error,
            PolicyError::UnknownPriority {
                location: "escalation.urgent".to_string(),
                priority: "urgent".to_string()
            }
        );
    }

    #[test]
    fn render_lists_steps_in_order() {
        let escalation = escalation(&high_priority_config());

        assert_eq!(
            escalation.render(Priority::High),
            "[0;3[ => supervisor: n+1, days: [Monday, Tuesday, Wednesday, Thursday, Friday]\n\
             [3;+∞[ => supervisor: director, days: [Monday, Tuesday, Wednesday, Thursday, Friday]"
        );
        assert_eq!(escalation.render(Priority::Normal), "");
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" normal ".parse::<Priority>(), Ok(Priority::Normal));
        assert_eq!("urgent".parse::<Priority>(), Err("urgent".to_string()));
    }

    proptest! {
        #[test]
        fn partitioned_chain_matches_exactly_one_step(days in 0u32..1_000_000) {
            let escalation = escalation(&BTreeMap::from([(
                "high".to_string(),
                chain(&[
                    ("[0;2[", step("self", &WORKWEEK)),
                    ("[2;9[", step("n+1", &WORKWEEK)),
                    ("[9;30[", step("director", &WORKWEEK)),
                    ("[30;+∞[", step("vp", &WORKWEEK)),
                ]),
            )]));

            let matching = escalation
                .steps(Priority::High)
                .iter()
                .filter(|step| step.range.is_in(days))
                .count();
            prop_assert_eq!(matching, 1);
            prop_assert!(escalation.filter(Priority::High, days, Weekday::Tue).is_some());
        }
    }
}
