//! BeaoCoin addresses.
//!
//! An address is a version byte (0) plus a 32-byte pubkey hash, written in
//! Bech32m (BIP-350) under the prefix `beao` on mainnet or `tbeao` on
//! testnet.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::PublicKey;
use crate::error::AddressError;
use crate::types::Hash256;

pub const ADDRESS_VERSION: u8 = 0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "beao",
            Network::Testnet => "tbeao",
        }
    }

    pub fn from_hrp(hrp: &str) -> Result<Self, AddressError> {
        match hrp {
            "beao" => Ok(Network::Mainnet),
            "tbeao" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        })
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: Hash256,
}

impl Address {
    pub fn from_pubkey_hash(pubkey_hash: Hash256, network: Network) -> Self {
        Self { network, pubkey_hash }
    }

    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_pubkey_hash(public_key.pubkey_hash(), network)
    }

    pub fn pubkey_hash(&self) -> Hash256 {
        self.pubkey_hash
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(53);
        payload.push(ADDRESS_VERSION);
        payload.extend(bech32m::regroup(self.pubkey_hash.as_bytes(), 8, 5, true).unwrap_or_default());
        bech32m::encode(self.network.hrp(), &payload)
    }

    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let (hrp, payload) = bech32m::decode(s)?;
        let (&version, program) = payload.split_first().ok_or(AddressError::InvalidLength)?;
        if version != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion(version));
        }
        let bytes = bech32m::regroup(program, 5, 8, false).ok_or(AddressError::InvalidPadding)?;
        let hash: [u8; 32] = bytes.try_into().map_err(|_| AddressError::InvalidLength)?;
        let network = Network::from_hrp(&hrp)?;
        Ok(Self { network, pubkey_hash: Hash256(hash) })
    }

    /// Decode and require the given network.
    pub fn decode_for(s: &str, network: Network) -> Result<Self, AddressError> {
        let addr = Self::decode(s)?;
        if addr.network != network {
            return Err(AddressError::InvalidHrp);
        }
        Ok(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

mod bech32m {
    use crate::error::AddressError;

    const CONST: u32 = 0x2bc8_30a3;
    const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
    const GEN: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
    const CHECKSUM_LEN: usize = 6;

    fn polymod(values: impl IntoIterator<Item = u8>) -> u32 {
        values.into_iter().fold(1u32, |chk, v| {
            let top = chk >> 25;
            let mut next = ((chk & 0x01ff_ffff) << 5) ^ u32::from(v);
            for (i, g) in GEN.iter().enumerate() {
                if (top >> i) & 1 == 1 {
                    next ^= g;
                }
            }
            next
        })
    }

    fn hrp_values(hrp: &str) -> impl Iterator<Item = u8> + '_ {
        hrp.bytes()
            .map(|c| c >> 5)
            .chain(std::iter::once(0))
            .chain(hrp.bytes().map(|c| c & 0x1f))
    }

    pub(super) fn encode(hrp: &str, payload: &[u8]) -> String {
        let residue = polymod(
            hrp_values(hrp).chain(payload.iter().copied()).chain([0u8; CHECKSUM_LEN]),
        ) ^ CONST;
        let checksum = (0..CHECKSUM_LEN).map(|i| ((residue >> (5 * (5 - i))) & 0x1f) as u8);

        let mut out = String::with_capacity(hrp.len() + 1 + payload.len() + CHECKSUM_LEN);
        out.push_str(hrp);
        out.push('1');
        out.extend(payload.iter().copied().chain(checksum).map(|d| CHARSET[d as usize] as char));
        out
    }

    /// Returns the lowercase HRP and the payload without checksum.
    pub(super) fn decode(s: &str) -> Result<(String, Vec<u8>), AddressError> {
        if s.chars().any(|c| c.is_ascii_lowercase()) && s.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(AddressError::MixedCase);
        }
        let lower = s.to_ascii_lowercase();
        let sep = lower.rfind('1').ok_or(AddressError::MissingSeparator)?;
        if sep == 0 {
            return Err(AddressError::InvalidHrp);
        }
        let (hrp, rest) = (&lower[..sep], &lower[sep + 1..]);
        if rest.len() <= CHECKSUM_LEN {
            return Err(AddressError::InvalidLength);
        }

        let data = rest
            .chars()
            .map(|c| {
                CHARSET
                    .iter()
                    .position(|&x| x as char == c)
                    .map(|p| p as u8)
                    .ok_or(AddressError::InvalidCharacter(c))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        if polymod(hrp_values(hrp).chain(data.iter().copied())) != CONST {
            return Err(AddressError::InvalidChecksum);
        }
        let payload = data[..data.len() - CHECKSUM_LEN].to_vec();
        Ok((hrp.to_string(), payload))
    }

    /// Regroup a bit stream between widths (8 <-> 5).
    pub(super) fn regroup(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
        let mask = (1u32 << to) - 1;
        let (mut acc, mut bits) = (0u32, 0u32);
        let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
        for &value in data {
            if u32::from(value) >> from != 0 {
                return None;
            }
            acc = (acc << from) | u32::from(value);
            bits += from;
            while bits >= to {
                bits -= to;
                out.push(((acc >> bits) & mask) as u8);
            }
        }
        if pad {
            if bits > 0 {
                out.push(((acc << (to - bits)) & mask) as u8);
            }
        } else if bits >= from || ((acc << (to - bits)) & mask) != 0 {
            return None;
        }
        Some(out)
    }
}
