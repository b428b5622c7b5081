#![forbid(unsafe_code)]

//! Immutable per-item profiles.
//!
//! A [`ProfileTable`] is built once at startup (from [`ProfileTable::builtin`]
//! or, with the `config` feature, from TOML/JSON) and never mutated. Lookup of
//! an unknown identifier returns `None`; callers treat that as a silent no-op.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::scene::ids;

/// One bucket of the age histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct AgeBin {
    pub bin: String,
    pub count: u32,
}

/// Order count for one time-of-day period.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct PeriodCount {
    pub period: String,
    pub count: u32,
}

/// Static sales profile for one menu item.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct ItemProfile {
    /// Share of total sales, in percent (0..=100).
    pub sales_share: f64,
    pub avg_age: u32,
    pub age_distribution: Vec<AgeBin>,
    /// Declaration order is display order.
    pub time_of_day: Vec<PeriodCount>,
    pub favorite_count: u32,
}

impl ItemProfile {
    /// Period with the highest count. Ties go to the earliest period.
    #[must_use]
    pub fn peak_period(&self) -> Option<&str> {
        let mut best: Option<&PeriodCount> = None;
        for entry in &self.time_of_day {
            if best.is_none_or(|b| entry.count > b.count) {
                best = Some(entry);
            }
        }
        best.map(|b| b.period.as_str())
    }

    fn validate(&self, id: &str) -> Result<(), ProfileError> {
        if !(0.0..=100.0).contains(&self.sales_share) || self.sales_share.is_nan() {
            return Err(ProfileError::ShareOutOfRange {
                id: id.to_string(),
                share: self.sales_share,
            });
        }
        Ok(())
    }
}

/// Profiles keyed by item identifier, in menu order.
///
/// Only [`ProfileTable::new`] and the loaders built on it produce a table, so
/// every table has passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileTable {
    items: Vec<(String, ItemProfile)>,
}

impl ProfileTable {
    /// Build a table, rejecting empty, reserved or duplicate ids and out-of-range shares.
    pub fn new(
        items: impl IntoIterator<Item = (String, ItemProfile)>,
    ) -> Result<Self, ProfileError> {
        let mut table = Self { items: Vec::new() };
        for (id, profile) in items {
            if id.is_empty() {
                return Err(ProfileError::EmptyId);
            }
            if id == ids::HOME {
                return Err(ProfileError::ReservedId(id));
            }
            if table.get(&id).is_some() {
                return Err(ProfileError::DuplicateId(id));
            }
            profile.validate(&id)?;
            table.items.push((id, profile));
        }
        Ok(table)
    }

    /// The five-drink menu the presentation ships with.
    #[must_use]
    pub fn builtin() -> Self {
        let ages = |counts: [u32; 5]| {
            ["18-24", "25-34", "35-44", "45-54", "55+"]
                .into_iter()
                .zip(counts)
                .map(|(bin, count)| AgeBin {
                    bin: bin.to_string(),
                    count,
                })
                .collect()
        };
        let periods = |counts: [u32; 3]| {
            ["Morning", "Afternoon", "Evening"]
                .into_iter()
                .zip(counts)
                .map(|(period, count)| PeriodCount {
                    period: period.to_string(),
                    count,
                })
                .collect()
        };
        let item = |share, age, bins, times, fav| ItemProfile {
            sales_share: share,
            avg_age: age,
            age_distribution: ages(bins),
            time_of_day: periods(times),
            favorite_count: fav,
        };
        Self {
            items: vec![
                (
                    "latte".into(),
                    item(21.3, 28, [41, 66, 22, 9, 4], [38, 71, 33], 142),
                ),
                (
                    "cappuccino".into(),
                    item(18.7, 31, [22, 58, 31, 12, 5], [44, 52, 17], 98),
                ),
                (
                    "americano".into(),
                    item(22.1, 34, [12, 49, 47, 23, 11], [83, 54, 19], 156),
                ),
                (
                    "cortado".into(),
                    item(15.4, 30, [19, 51, 24, 8, 3], [29, 48, 22], 67),
                ),
                (
                    "espresso".into(),
                    item(10.2, 36, [6, 21, 27, 16, 9], [21, 36, 14], 53),
                ),
            ],
        }
    }

    /// Look up a profile by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ItemProfile> {
        self.items.iter().find(|(k, _)| k == id).map(|(_, p)| p)
    }

    /// Item identifiers in menu order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    /// `(id, profile)` pairs in menu order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemProfile)> {
        self.items.iter().map(|(k, p)| (k.as_str(), p))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(feature = "config")]
impl ProfileTable {
    /// Load from a TOML string. Each top-level table is one item.
    pub fn from_toml_str(s: &str) -> Result<Self, ProfileError> {
        let raw: toml::Table = toml::from_str(s).map_err(ProfileError::Toml)?;
        let mut items = Vec::with_capacity(raw.len());
        for (id, value) in raw {
            let profile: ItemProfile = value.try_into().map_err(ProfileError::Toml)?;
            items.push((id, profile));
        }
        Self::new(items)
    }

    /// Load from a JSON object of `id -> profile`.
    pub fn from_json_str(s: &str) -> Result<Self, ProfileError> {
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(s).map_err(ProfileError::Json)?;
        let mut items = Vec::with_capacity(raw.len());
        for (id, value) in raw {
            let profile: ItemProfile = serde_json::from_value(value).map_err(ProfileError::Json)?;
            items.push((id, profile));
        }
        Self::new(items)
    }
}
