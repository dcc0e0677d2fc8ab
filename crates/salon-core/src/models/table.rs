//! Remote table names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three tables mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Clients,
    Services,
    Appointments,
}

impl Table {
    /// Every mirrored table, in load order.
    pub const ALL: [Self; 3] = [Self::Clients, Self::Services, Self::Appointments];

    /// Table name as known by the remote store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Services => "services",
            Self::Appointments => "appointments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "clients" => Ok(Self::Clients),
            "services" => Ok(Self::Services),
            "appointments" => Ok(Self::Appointments),
            other => Err(format!("unknown table '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_round_trip_through_from_str() {
        for table in Table::ALL {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
        }
        assert!("notes".parse::<Table>().is_err());
    }
}
