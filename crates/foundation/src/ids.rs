use serde::{Deserialize, Serialize};

/// Stable identity of a tracked country.
///
/// Assigned by the server and immutable for the session. It is the only key
/// used to address a country anywhere in the client, including picking.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CountryId(pub u64);

impl CountryId {
    pub fn new(n: u64) -> Self {
        CountryId(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CountryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CountryId {
    fn from(n: u64) -> Self {
        CountryId(n)
    }
}
