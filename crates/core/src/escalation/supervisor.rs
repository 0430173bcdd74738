use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::directory::PeopleDirectory;
use crate::errors::ResolutionError;

/// Who gets notified once a step applies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Supervisor {
    /// `n+K`: the person's K-th level manager.
    NthManager(u32),
    Director,
    Vp,
    /// `self`: the person themselves.
    Myself,
    /// Any other tag: the caller supplies the person filling that role.
    NamedRole(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SupervisorParseError {
    #[error("supervisor tag is empty")]
    Empty,
    #[error("manager level in `{tag}` must be a positive integer")]
    InvalidManagerLevel { tag: String },
}

/// People filling named roles for a single query, keyed by role name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContacts(BTreeMap<String, String>);

impl NamedContacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: impl Into<String>, person: impl Into<String>) -> Self {
        self.0.insert(role.into(), person.into());
        self
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.0.get(role).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for NamedContacts {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Supervisor {
    pub fn is_hierarchical(&self) -> bool {
        !matches!(self, Self::NamedRole(_))
    }

    pub fn named_role(&self) -> Option<&str> {
        match self {
            Self::NamedRole(role) => Some(role),
            _ => None,
        }
    }

    /// Resolves the contact address to notify about `person`.
    ///
    /// An unknown or skiplisted address falls back to the first level manager,
    /// then to the person's own address. The last fallback is reported to
    /// `audit` but is still a successful resolution.
    pub fn resolve<D>(
        &self,
        directory: &D,
        person: &str,
        skiplist: &BTreeSet<String>,
        context: &NamedContacts,
        audit: Option<&dyn AuditSink>,
    ) -> Result<String, ResolutionError>
    where
        D: PeopleDirectory + ?Sized,
    {
        let primary = match self {
            Self::NthManager(level) => directory.nth_manager_mail(person, *level),
            Self::Director => directory.director_mail(person),
            Self::Vp => directory.vp_mail(person),
            Self::Myself => directory.mail(person),
            Self::NamedRole(role) => {
                let Some(contact) = context.get(role) else {
                    return Err(ResolutionError::MissingNamedContact { role: role.clone() });
                };
                directory.mail(contact)
            }
        };

        if let Some(mail) = known(primary).filter(|mail| !is_skiplisted(skiplist, mail)) {
            return Ok(mail);
        }

        if let Some(mail) = known(directory.nth_manager_mail(person, 1)) {
            return Ok(mail);
        }

        let mail = known(directory.mail(person))
            .ok_or_else(|| ResolutionError::UnknownPerson { person: person.to_string() })?;

        // nobody above the person, so nag them directly
        info!(
            event_name = "escalation.supervisor_missing",
            supervisor = %self,
            person,
            "no supervisor found, notifying the person instead"
        );
        if let Some(sink) = audit {
            sink.emit(
                AuditEvent::new(
                    person,
                    "escalation.supervisor_missing",
                    AuditCategory::Escalation,
                    AuditOutcome::Degraded,
                )
                .with_metadata("supervisor", self.to_string()),
            );
        }

        Ok(mail)
    }
}

fn known(mail: Option<String>) -> Option<String> {
    mail.filter(|mail| !mail.trim().is_empty())
}

/// Addresses compare case-insensitively, like directory lookups.
fn is_skiplisted(skiplist: &BTreeSet<String>, mail: &str) -> bool {
    let mail = mail.trim();
    skiplist.iter().any(|skipped| skipped.trim().eq_ignore_ascii_case(mail))
}

impl FromStr for Supervisor {
    type Err = SupervisorParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tag = raw.trim();
        if tag.is_empty() {
            return Err(SupervisorParseError::Empty);
        }

        if let Some(level) = tag.strip_prefix("n+") {
            let digits_only = !level.is_empty() && level.bytes().all(|byte| byte.is_ascii_digit());
            return match level.parse::<u32>() {
                Ok(level) if digits_only && level > 0 => Ok(Self::NthManager(level)),
                _ => Err(SupervisorParseError::InvalidManagerLevel { tag: tag.to_string() }),
            };
        }

        Ok(match tag {
            "director" => Self::Director,
            "vp" => Self::Vp,
            "self" => Self::Myself,
            other => Self::NamedRole(other.to_string()),
        })
    }
}

impl TryFrom<String> for Supervisor {
    type Error = SupervisorParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Supervisor> for String {
    fn from(supervisor: Supervisor) -> Self {
        supervisor.to_string()
    }
}

impl fmt::Display for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NthManager(level) => write!(f, "n+{level}"),
            Self::Director => f.write_str("director"),
            Self::Vp => f.write_str("vp"),
            Self::Myself => f.write_str("self"),
            Self::NamedRole(role) => f.write_str(role),
        }
    }
}
