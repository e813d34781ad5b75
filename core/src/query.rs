//! Listing query parameters.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_KEYWORD: &str = "補助金";

/// Field the listing is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedDate,
    AcceptanceStart,
    AcceptanceEnd,
}

impl SortField {
    pub fn as_param(self) -> &'static str {
        match self {
            SortField::CreatedDate => "created_date",
            SortField::AcceptanceStart => "acceptance_start_datetime",
            SortField::AcceptanceEnd => "acceptance_end_datetime",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_param(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Which result set the listing endpoint draws from.
///
/// Whether `All` is a strict superset of `Open` is not documented upstream,
/// so nothing here assumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Acceptance {
    /// Only subsidies currently accepting applications (`acceptance=1`).
    #[default]
    Open,
    /// All-time result set (`acceptance=0`).
    All,
}

impl Acceptance {
    pub fn as_param(self) -> &'static str {
        match self {
            Acceptance::Open => "1",
            Acceptance::All => "0",
        }
    }
}

/// Parameters for one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub keyword: String,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub acceptance: Acceptance,
    pub target_area_search: Option<String>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
            acceptance: Acceptance::default(),
            target_area_search: None,
        }
    }
}

impl ListingQuery {
    /// Query parameters in the order the upstream documentation lists them.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("keyword".to_string(), self.keyword.clone()),
            ("sort".to_string(), self.sort_field.as_param().to_string()),
            ("order".to_string(), self.sort_order.as_param().to_string()),
            ("acceptance".to_string(), self.acceptance.as_param().to_string()),
        ];
        if let Some(area) = &self.target_area_search {
            params.push(("target_area_search".to_string(), area.clone()));
        }
        params
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The upstream API rejects keywords shorter than two characters.
        if self.keyword.trim().chars().count() < 2 {
            return Err(ConfigError::Invalid {
                name: "keyword",
                reason: "must be at least two characters".to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for SortField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "created_date" => Ok(SortField::CreatedDate),
            "acceptance_start" | "acceptance_start_datetime" => Ok(SortField::AcceptanceStart),
            "acceptance_end" | "acceptance_end_datetime" => Ok(SortField::AcceptanceEnd),
            other => Err(ConfigError::Invalid {
                name: "sort",
                reason: format!("unknown sort field {other:?}"),
            }),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ConfigError::Invalid {
                name: "order",
                reason: format!("expected asc or desc, got {other:?}"),
            }),
        }
    }
}

impl FromStr for Acceptance {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" | "1" => Ok(Acceptance::Open),
            "all" | "0" => Ok(Acceptance::All),
            other => Err(ConfigError::Invalid {
                name: "acceptance",
                reason: format!("expected open or all, got {other:?}"),
            }),
        }
    }
}

impl fmt::Display for Acceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceptance::Open => write!(f, "open"),
            Acceptance::All => write!(f, "all"),
        }
    }
}
