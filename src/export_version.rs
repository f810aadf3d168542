use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version of the WordPress eXtended RSS format an export was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportVersion {
    pub major: u32,
    pub minor: u32,
}

impl ExportVersion {
    /// Oldest and newest export formats the field layout is known for.
    pub const OLDEST_SUPPORTED: ExportVersion = ExportVersion::new(1, 0);
    pub const NEWEST_SUPPORTED: ExportVersion = ExportVersion::new(1, 2);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_supported(&self) -> bool {
        (Self::OLDEST_SUPPORTED..=Self::NEWEST_SUPPORTED).contains(self)
    }
}

impl fmt::Display for ExportVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ExportVersion {
    type Err = ExportVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| ExportVersionError::InvalidFormat(s.to_string()))?;

        let major = major.parse().map_err(|_| ExportVersionError::InvalidFormat(s.to_string()))?;
        let minor = minor.parse().map_err(|_| ExportVersionError::InvalidFormat(s.to_string()))?;

        Ok(ExportVersion::new(major, minor))
    }
}

impl PartialOrd for ExportVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExportVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major.cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
    }
}

#[derive(Debug, Error)]
pub enum ExportVersionError {
    #[error("Invalid export version format: {0}")]
    InvalidFormat(String),
}
