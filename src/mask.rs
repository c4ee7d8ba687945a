//! Address masks in CIDR notation
//!
//! An [`AddressMask`] pairs an IP address with a prefix length and answers
//! the containment question at connection time. A bare address implies a
//! host-specific mask (/32 for IPv4, /128 for IPv6).
//!
//! Accepted input examples:
//!   192.0.2.5
//!   192.0.2.0/27
//!   2002:db8::b00b:face
//!   2002:db8::/64

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FilterError, Result};

/// A network address with an associated prefix length.
///
/// Immutable once constructed; the prefix is always within the bit width
/// of the address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressMask {
    addr: IpAddr,
    prefix: u8,
}

impl AddressMask {
    /// Parse a bare address or `address/prefix` pair.
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || FilterError::BadAddress(s.to_string());

        let (addr_part, prefix_part) = match s.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s, None),
        };

        let addr: IpAddr = addr_part.parse().map_err(|_| bad())?;
        let max = family_bits(&addr);

        let prefix = match prefix_part {
            Some(p) => {
                let prefix: u8 = p.parse().map_err(|_| bad())?;
                if prefix > max {
                    return Err(bad());
                }
                prefix
            }
            None => max,
        };

        Ok(Self { addr, prefix })
    }

    /// Host-specific mask for a single address.
    pub fn host(addr: IpAddr) -> Self {
        Self {
            prefix: family_bits(&addr),
            addr,
        }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// True iff the top `prefix` bits of `candidate` equal the top
    /// `prefix` bits of this mask. Cross-family never matches.
    pub fn contains(&self, candidate: IpAddr) -> bool {
        match (self.addr, candidate) {
            (IpAddr::V4(a), IpAddr::V4(b)) => {
                prefix_eq(u32::from(a) as u128, u32::from(b) as u128, 32, self.prefix)
            }
            (IpAddr::V6(a), IpAddr::V6(b)) => {
                prefix_eq(u128::from(a), u128::from(b), 128, self.prefix)
            }
            _ => false,
        }
    }
}

fn family_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn prefix_eq(a: u128, b: u128, width: u8, prefix: u8) -> bool {
    if prefix == 0 {
        return true;
    }
    let shift = width - prefix;
    (a >> shift) == (b >> shift)
}

impl fmt::Display for AddressMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for AddressMask {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for AddressMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AddressMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
