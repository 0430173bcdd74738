use thiserror::Error;

use crate::escalation::range::RangeParseError;
use crate::escalation::supervisor::SupervisorParseError;
use crate::weekday::UnknownWeekday;

/// A policy entry that cannot be turned into a rule.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{location}: {source}")]
    Range { location: String, source: RangeParseError },
    #[error("{location}: {source}")]
    Supervisor { location: String, source: SupervisorParseError },
    #[error("{location}: {source}")]
    Weekday { location: String, source: UnknownWeekday },
    #[error("{location}: unknown priority `{priority}` (expected high|normal|default)")]
    UnknownPriority { location: String, priority: String },
    #[error(
        "{location}: supervisor `{role}` is not a management position and is not listed in policy.context_roles"
    )]
    UndeclaredRole { location: String, role: String },
}

impl PolicyError {
    pub fn location(&self) -> &str {
        match self {
            Self::Range { location, .. }
            | Self::Supervisor { location, .. }
            | Self::Weekday { location, .. }
            | Self::UnknownPriority { location, .. }
            | Self::UndeclaredRole { location, .. } => location,
        }
    }
}

/// A query that cannot be answered with the inputs it was given.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("supervisor `{role}` requires a contact for that role, but none was supplied")]
    MissingNamedContact { role: String },
    #[error("directory has no address for `{person}`")]
    UnknownPerson { person: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, error_class: &'static str },
    #[error("configuration error: {message}")]
    Configuration { message: String, error_class: &'static str },
}

impl InterfaceError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { error_class, .. } | Self::Configuration { error_class, .. } => {
                error_class
            }
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration { .. } => 2,
            Self::BadRequest { .. } => 3,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Policy(error) => {
                Self::Configuration { message: error.to_string(), error_class: "policy_format" }
            }
            ApplicationError::Resolution(error) => {
                Self::BadRequest { message: error.to_string(), error_class: "resolution" }
            }
        }
    }
}
