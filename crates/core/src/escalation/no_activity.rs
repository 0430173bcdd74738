use std::collections::BTreeMap;

use crate::errors::PolicyError;
use crate::escalation::range::Range;
use crate::escalation::PolicyOptions;

/// Inactivity thresholds keyed by day ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoActivityDays {
    thresholds: Vec<(Range, u32)>,
}

impl NoActivityDays {
    pub fn new(mut thresholds: Vec<(Range, u32)>) -> Self {
        thresholds.sort_by_key(|(range, _)| range.lower());
        Self { thresholds }
    }

    pub fn from_config(
        section: &str,
        config: &BTreeMap<String, u32>,
        options: &PolicyOptions,
    ) -> Result<Self, PolicyError> {
        let mut thresholds = Vec::with_capacity(config.len());
        for (range_key, threshold) in config {
            let parsed = range_key.parse::<Range>().map_err(|source| PolicyError::Range {
                location: format!("{section}.\"{range_key}\""),
                source,
            });
            if let Some(range) = options.admit(parsed)? {
                thresholds.push((range, *threshold));
            }
        }

        Ok(Self::new(thresholds))
    }

    pub fn get(&self, ndays: u32) -> Option<u32> {
        self.thresholds
            .iter()
            .find(|(range, _)| range.is_in(ndays))
            .map(|(_, threshold)| *threshold)
    }

    pub fn entries(&self) -> &[(Range, u32)] {
        &self.thresholds
    }
}
