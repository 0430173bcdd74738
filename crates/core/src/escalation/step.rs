use std::collections::BTreeSet;
use std::fmt;

use chrono::Weekday;

use crate::audit::AuditSink;
use crate::directory::PeopleDirectory;
use crate::errors::ResolutionError;
use crate::escalation::range::Range;
use crate::escalation::supervisor::{NamedContacts, Supervisor};
use crate::weekday::WeekdaySet;

/// One policy rule: while inactivity falls in `range`, notify `supervisor` on
/// the weekdays in `days`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub range: Range,
    pub supervisor: Supervisor,
    pub days: WeekdaySet,
}

impl Step {
    pub fn new(range: Range, supervisor: Supervisor, days: WeekdaySet) -> Self {
        Self { range, supervisor, days }
    }

    /// Sort key for sibling steps.
    pub fn lower_bound(&self) -> u32 {
        self.range.lower()
    }

    /// `None` when this step does not cover `days`.
    pub fn get_supervisor<D>(
        &self,
        days: u32,
        directory: &D,
        person: &str,
        skiplist: &BTreeSet<String>,
        context: &NamedContacts,
        audit: Option<&dyn AuditSink>,
    ) -> Option<Result<String, ResolutionError>>
    where
        D: PeopleDirectory + ?Sized,
    {
        self.range
            .is_in(days)
            .then(|| self.supervisor.resolve(directory, person, skiplist, context, audit))
    }

    /// `None` when this step does not cover `days`.
    pub fn filter(&self, days: u32, weekday: Weekday) -> Option<bool> {
        self.range.is_in(days).then(|| self.days.contains(weekday))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => supervisor: {}, days: {}", self.range, self.supervisor, self.days)
    }
}
