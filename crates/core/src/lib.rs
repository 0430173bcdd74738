pub mod audit;
pub mod config;
pub mod directory;
pub mod errors;
pub mod escalation;
pub mod weekday;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use directory::{InMemoryDirectory, OrgTitle, PeopleDirectory, PersonRecord};
pub use errors::{ApplicationError, InterfaceError, PolicyError, ResolutionError};
pub use escalation::{
    Escalation, EscalationConfig, NamedContacts, NoActivityDays, PolicyOptions, Priority, Range,
    Step, StepConfig, Supervisor,
};
pub use weekday::WeekdaySet;
