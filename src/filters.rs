use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

use crate::models::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FacetKey {
    Cities,
    Departments,
    JobTypes,
    Experiences,
    Salaries,
}

impl FacetKey {
    pub const ALL: [FacetKey; 5] = [
        FacetKey::Cities,
        FacetKey::Departments,
        FacetKey::JobTypes,
        FacetKey::Experiences,
        FacetKey::Salaries,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FacetKey::Cities => "cities",
            FacetKey::Departments => "departments",
            FacetKey::JobTypes => "jobTypes",
            FacetKey::Experiences => "experiences",
            FacetKey::Salaries => "salaries",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FacetKey::Cities => "City",
            FacetKey::Departments => "Department",
            FacetKey::JobTypes => "Job Type",
            FacetKey::Experiences => "Experience",
            FacetKey::Salaries => "Salary",
        }
    }

    pub fn api_param(self) -> &'static str {
        match self {
            FacetKey::Cities => "City[]",
            FacetKey::Departments => "Department[]",
            FacetKey::JobTypes => "JobType[]",
            FacetKey::Experiences => "Experience[]",
            FacetKey::Salaries => "Salary[]",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FacetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacetKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacetKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown facet '{}'", s))
    }
}

/// Selected values per facet, kept in selection order. Every facet is always
/// present, possibly empty. Equality ignores the order.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    values: [Vec<String>; 5],
}

impl PartialEq for FilterState {
    fn eq(&self, other: &Self) -> bool {
        self.values.iter().zip(&other.values).all(|(a, b)| {
            a.len() == b.len() && a.iter().all(|v| b.contains(v))
        })
    }
}

impl Eq for FilterState {}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: FacetKey) -> &[String] {
        &self.values[key.index()]
    }

    pub fn contains(&self, key: FacetKey, value: &str) -> bool {
        self.get(key).iter().any(|v| v == value)
    }

    pub fn insert(&mut self, key: FacetKey, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.contains(key, &value) {
            return false;
        }
        self.values[key.index()].push(value);
        true
    }

    pub fn remove(&mut self, key: FacetKey, value: &str) -> bool {
        let values = &mut self.values[key.index()];
        match values.iter().position(|v| v == value) {
            Some(pos) => {
                values.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Adds `value` when absent, removes it when present. Returns whether it
    /// is selected afterwards.
    pub fn toggle(&mut self, key: FacetKey, value: &str) -> bool {
        if self.remove(key, value) {
            false
        } else {
            self.insert(key, value)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.values.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FacetKey, &str)> {
        FacetKey::ALL
            .into_iter()
            .flat_map(move |key| self.get(key).iter().map(move |v| (key, v.as_str())))
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut state = Self::new();
        for (key, value) in pairs {
            if let Ok(key) = key.as_ref().parse::<FacetKey>() {
                state.insert(key, value);
            }
        }
        state
    }

    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.iter() {
            serializer.append_pair(key.as_str(), value);
        }
        serializer.finish()
    }

    pub fn api_params(&self) -> Vec<(&'static str, String)> {
        [
            FacetKey::JobTypes,
            FacetKey::Cities,
            FacetKey::Departments,
            FacetKey::Experiences,
            FacetKey::Salaries,
        ]
        .into_iter()
        .flat_map(|key| self.get(key).iter().map(move |v| (key.api_param(), v.clone())))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterDraft {
    pending: FilterState,
    applied: FilterState,
}

impl FilterDraft {
    pub fn new(initial: FilterState) -> Self {
        Self {
            pending: initial.clone(),
            applied: initial,
        }
    }

    pub fn pending(&self) -> &FilterState {
        &self.pending
    }

    pub fn applied(&self) -> &FilterState {
        &self.applied
    }

    pub fn toggle(&mut self, key: FacetKey, value: &str) -> bool {
        self.pending.toggle(key, value)
    }

    pub fn commit(&mut self) {
        self.applied = self.pending.clone();
    }

    pub fn reset(&mut self) {
        self.pending = FilterState::new();
        self.applied = FilterState::new();
    }

    pub fn remove_applied(&mut self, key: FacetKey, value: &str) -> bool {
        self.pending.remove(key, value);
        self.applied.remove(key, value)
    }
}

/// Distinct values per facet, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetOptions {
    values: [Vec<String>; 5],
}

impl FacetOptions {
    pub fn get(&self, key: FacetKey) -> &[String] {
        &self.values[key.index()]
    }
}

pub fn derive_facet_options(jobs: &[Job]) -> FacetOptions {
    let mut options = FacetOptions::default();
    let mut seen: [HashSet<&str>; 5] = Default::default();

    for job in jobs {
        for key in FacetKey::ALL {
            if let Some(value) = job.facet(key) {
                if seen[key.index()].insert(value) {
                    options.values[key.index()].push(value.to_string());
                }
            }
        }
    }

    options
}
