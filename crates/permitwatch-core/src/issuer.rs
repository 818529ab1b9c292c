use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// An external authority publishing permit data. Each issuer has a dedicated
/// source adapter; adding an issuer means adding a variant and an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Issuer {
    /// Sector 1 city hall: spreadsheet files linked from an HTML listing page.
    Ps1,
    /// Bucharest urbanism portal: paginated table API plus a geometry API.
    Pmb,
}

impl Issuer {
    pub const ALL: [Issuer; 2] = [Issuer::Ps1, Issuer::Pmb];

    /// Wire name used in storage and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Issuer::Ps1 => "ps1",
            Issuer::Pmb => "pmb",
        }
    }

    /// Upper-case tag used in log lines and user-facing messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Issuer::Ps1 => "PS1",
            Issuer::Pmb => "PMB",
        }
    }
}

impl std::fmt::Display for Issuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Issuer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ps1" => Ok(Issuer::Ps1),
            "pmb" => Ok(Issuer::Pmb),
            other => Err(CoreError::UnknownIssuer(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!("ps1".parse::<Issuer>().unwrap(), Issuer::Ps1);
        assert_eq!(" PMB ".parse::<Issuer>().unwrap(), Issuer::Pmb);
    }

    #[test]
    fn rejects_unknown_issuer() {
        let err = "ps2".parse::<Issuer>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownIssuer(ref s) if s == "ps2"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for issuer in Issuer::ALL {
            assert_eq!(issuer.to_string().parse::<Issuer>().unwrap(), issuer);
        }
    }

    #[test]
    fn serializes_as_lowercase_string() {
        let json = serde_json::to_string(&Issuer::Pmb).unwrap();
        assert_eq!(json, "\"pmb\"");
    }
}
