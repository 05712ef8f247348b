use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// EVM chain identifier of one registry deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    pub const ETHEREUM: Self = Self(1);
    pub const SEPOLIA: Self = Self(11_155_111);
    pub const BASE: Self = Self(8_453);
    pub const BASE_SEPOLIA: Self = Self(84_532);
    pub const POLYGON: Self = Self(137);
    pub const POLYGON_AMOY: Self = Self(80_002);
    pub const LINEA_SEPOLIA: Self = Self(59_141);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Human readable network name, when the chain is a well-known one.
    pub const fn known_name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("ethereum"),
            11_155_111 => Some("sepolia"),
            8_453 => Some("base"),
            84_532 => Some("base-sepolia"),
            137 => Some("polygon"),
            80_002 => Some("polygon-amoy"),
            59_141 => Some("linea-sepolia"),
            _ => None,
        }
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(Self(parsed)),
            _ => Err(ValidationError::InvalidChainId {
                value: value.trim().to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_chain_ids() {
        assert_eq!("84532".parse::<ChainId>(), Ok(ChainId::BASE_SEPOLIA));
        assert_eq!(" 1 ".parse::<ChainId>(), Ok(ChainId::ETHEREUM));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(matches!(
            "0".parse::<ChainId>(),
            Err(ValidationError::InvalidChainId { .. })
        ));
        assert!("base".parse::<ChainId>().is_err());
    }

    #[test]
    fn known_names_cover_testnets() {
        assert_eq!(ChainId::SEPOLIA.known_name(), Some("sepolia"));
        assert_eq!(ChainId::new(424_242).known_name(), None);
    }
}
