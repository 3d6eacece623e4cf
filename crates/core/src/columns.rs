use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Columns written by the job when nothing else is configured.
pub const STANDARD_COLUMNS: &[&str] = &[
    "alien_id",
    "alien_name",
    "species",
    "home_planet",
    "strength_level",
    "speed_level",
    "intelligence",
];

/// Ordered, duplicate-free list of column names that defines the output schema.
///
/// The order here is the order of the written Parquet schema and of the
/// catalog column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSet {
    names: Vec<String>,
}

impl ColumnSet {
    /// The seven-column set: identifier, name, species, origin and three ratings.
    pub fn standard() -> Self {
        Self {
            names: STANDARD_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ConfigError::EmptyColumnSet);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateColumn(name.clone()));
            }
        }

        Ok(Self { names })
    }

    /// Parse a comma separated list (`"a, b,c"`). Blank entries are ignored.
    pub fn parse_list(list: &str) -> Result<Self, ConfigError> {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

impl Default for ColumnSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for ColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(","))
    }
}

impl TryFrom<Vec<String>> for ColumnSet {
    type Error = ConfigError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<ColumnSet> for Vec<String> {
    fn from(set: ColumnSet) -> Self {
        set.names
    }
}
