use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown weekday `{0}`")]
pub struct UnknownWeekday(pub String);

/// Index of `day` in the week, Monday being 0.
pub fn weekday_index(day: Weekday) -> u8 {
    // num_days_from_monday is always < 7
    day.num_days_from_monday() as u8
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    WEEKDAYS.get(usize::from(index)).copied()
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Accepts full names and three letter abbreviations, in any case.
pub fn parse_weekday(raw: &str) -> Result<Weekday, UnknownWeekday> {
    raw.trim().parse::<Weekday>().map_err(|_| UnknownWeekday(raw.to_string()))
}

/// Set of weekdays a step is allowed to notify on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << weekday_index(day);
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << weekday_index(day)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(|day| self.contains(*day))
    }

    pub fn parse_names<I, S>(names: I) -> Result<Self, UnknownWeekday>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for name in names {
            set.insert(parse_weekday(name.as_ref())?);
        }
        Ok(set)
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        let mut set = Self::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl TryFrom<Vec<String>> for WeekdaySet {
    type Error = UnknownWeekday;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse_names(names)
    }
}

impl From<WeekdaySet> for Vec<String> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().map(|day| weekday_name(day).to_string()).collect()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(weekday_name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
