//! IPv4 CIDR block value object.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// An IPv4 network in CIDR notation.
///
/// Invariants:
/// - prefix length is 0-32
/// - host bits of the network address are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(cidr: impl AsRef<str>) -> ConfigResult<Self> {
        let cidr = cidr.as_ref().trim();
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidCidr(format!("{} (missing prefix length)", cidr)))?;

        let network = Ipv4Addr::from_str(addr_str)
            .map_err(|_| ConfigError::InvalidCidr(format!("{} (bad address)", cidr)))?;
        let prefix = prefix_str
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidCidr(format!("{} (bad prefix length)", cidr)))?;

        if prefix > 32 {
            return Err(ConfigError::InvalidCidr(format!(
                "{} (prefix length must be 0-32)",
                cidr
            )));
        }

        let candidate = Self { network, prefix };
        if u32::from(network) & !candidate.mask_bits() != 0 {
            return Err(ConfigError::InvalidCidr(format!(
                "{} (host bits set, network is {}/{})",
                cidr,
                Ipv4Addr::from(u32::from(network) & candidate.mask_bits()),
                prefix
            )));
        }

        Ok(candidate)
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn mask_bits(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    fn last(&self) -> u64 {
        self.first() + self.size() - 1
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.first() >= self.first() && other.last() <= self.last()
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }

    /// How many `/mask` subnets fit in this block.
    pub fn subnet_capacity(&self, mask: u8) -> u64 {
        if mask < self.prefix || mask > 32 {
            return 0;
        }
        1u64 << (u32::from(mask) - u32::from(self.prefix))
    }

    /// The `index`-th `/mask` subnet of this block, allocated in address order.
    pub fn subnet(&self, mask: u8, index: u64) -> ConfigResult<Ipv4Cidr> {
        let capacity = self.subnet_capacity(mask);
        if index >= capacity {
            return Err(ConfigError::AddressSpaceExhausted {
                cidr: self.to_string(),
                mask,
                required: index + 1,
                available: capacity,
            });
        }

        let step = 1u64 << (32 - u32::from(mask));
        let start = self.first() + index * step;
        let network = u32::try_from(start)
            .map_err(|_| ConfigError::InvalidCidr(format!("{} (subnet {} out of range)", self, index)))?;

        Ok(Self {
            network: Ipv4Addr::from(network),
            prefix: mask,
        })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_cidr() {
        let cidr = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        assert_eq!(cidr.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Ipv4Cidr::new("10.0.0.0").is_err());
        assert!(Ipv4Cidr::new("10.0.0/16").is_err());
        assert!(Ipv4Cidr::new("10.0.0.0/33").is_err());
        assert!(Ipv4Cidr::new("10.0.0.1/16").is_err());
    }

    #[test]
    fn test_subnet_allocation() {
        let cidr = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        assert_eq!(cidr.subnet_capacity(20), 16);
        assert_eq!(cidr.subnet(20, 0).unwrap().to_string(), "10.0.0.0/20");
        assert_eq!(cidr.subnet(20, 1).unwrap().to_string(), "10.0.16.0/20");
        assert_eq!(cidr.subnet(20, 5).unwrap().to_string(), "10.0.80.0/20");
    }

    #[test]
    fn test_subnet_exhaustion() {
        let cidr = Ipv4Cidr::new("10.0.0.0/22").unwrap();
        let err = cidr.subnet(24, 4).unwrap_err();
        assert!(matches!(err, ConfigError::AddressSpaceExhausted { available: 4, .. }));
    }

    #[test]
    fn test_overlap_and_containment() {
        let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        let inside = Ipv4Cidr::new("10.0.128.0/20").unwrap();
        let outside = Ipv4Cidr::new("10.1.0.0/16").unwrap();
        assert!(vpc.contains(&inside));
        assert!(vpc.overlaps(&inside));
        assert!(!vpc.overlaps(&outside));
    }
}
