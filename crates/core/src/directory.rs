use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Organizational directory used to turn a person into contact addresses.
///
/// Every lookup returns `None` when the directory has no answer; an empty
/// address is treated the same way by callers.
pub trait PeopleDirectory: Send + Sync {
    fn nth_manager_mail(&self, person: &str, level: u32) -> Option<String>;
    fn director_mail(&self, person: &str) -> Option<String>;
    fn vp_mail(&self, person: &str) -> Option<String>;
    fn mail(&self, person: &str) -> Option<String>;
}

impl<D> PeopleDirectory for &D
where
    D: PeopleDirectory + ?Sized,
{
    fn nth_manager_mail(&self, person: &str, level: u32) -> Option<String> {
        (**self).nth_manager_mail(person, level)
    }

    fn director_mail(&self, person: &str) -> Option<String> {
        (**self).director_mail(person)
    }

    fn vp_mail(&self, person: &str) -> Option<String> {
        (**self).vp_mail(person)
    }

    fn mail(&self, person: &str) -> Option<String> {
        (**self).mail(person)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgTitle {
    #[default]
    Individual,
    Manager,
    Director,
    Vp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    pub mail: String,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub title: OrgTitle,
}

/// Directory backed by a fixed list of person records. Identifiers and
/// addresses are matched case-insensitively, so a person may be looked up
/// either by id or by mail.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    people: HashMap<String, PersonRecord>,
    ids_by_mail: HashMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new(people: Vec<PersonRecord>) -> Self {
        let ids_by_mail = people
            .iter()
            .map(|person| (normalize_key(&person.mail), normalize_key(&person.id)))
            .collect();
        let people = people.into_iter().map(|person| (normalize_key(&person.id), person)).collect();

        Self { people, ids_by_mail }
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    fn record(&self, person: &str) -> Option<&PersonRecord> {
        let key = normalize_key(person);
        self.people
            .get(&key)
            .or_else(|| self.ids_by_mail.get(&key).and_then(|id| self.people.get(id)))
    }

    fn manager_chain(&self, person: &str) -> Vec<&PersonRecord> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let Some(mut current) = self.record(person) else {
            return chain;
        };

        loop {
            if !visited.insert(normalize_key(&current.id)) {
                break;
            }

            let Some(manager) = current.manager.as_deref().and_then(|id| self.record(id)) else {
                break;
            };

            chain.push(manager);
            current = manager;
        }

        chain
    }

    fn first_manager_titled(&self, person: &str, title: OrgTitle) -> Option<String> {
        self.manager_chain(person)
            .into_iter()
            .find(|manager| manager.title == title)
            .map(|manager| manager.mail.clone())
    }
}

impl PeopleDirectory for InMemoryDirectory {
    fn nth_manager_mail(&self, person: &str, level: u32) -> Option<String> {
        let index = usize::try_from(level).ok()?.checked_sub(1)?;
        self.manager_chain(person).get(index).map(|manager| manager.mail.clone())
    }

    fn director_mail(&self, person: &str) -> Option<String> {
        self.first_manager_titled(person, OrgTitle::Director)
    }

    fn vp_mail(&self, person: &str) -> Option<String> {
        self.first_manager_titled(person, OrgTitle::Vp)
    }

    fn mail(&self, person: &str) -> Option<String> {
        self.record(person).map(|record| record.mail.clone())
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
