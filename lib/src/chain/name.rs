use crate::error::CodecError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Base-32 encoded 64-bit account, permission or action name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(u64);

impl Name {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Compile-time name literal; invalid input fails const evaluation
    pub const fn constant(s: &str) -> Self {
        let bytes = s.as_bytes();
        assert!(bytes.len() <= 13, "name longer than 13 characters");

        let mut value = 0u64;
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            let sym = match c {
                b'a'..=b'z' => (c - b'a') as u64 + 6,
                b'1'..=b'5' => (c - b'1') as u64 + 1,
                b'.' => 0,
                _ => panic!("invalid name character"),
            };
            if i < 12 {
                value |= sym << (64 - 5 * (i + 1));
            } else {
                assert!(sym <= 0x0f, "invalid 13th name character");
                value |= sym;
            }
            i += 1;
        }
        Self(value)
    }
}

fn symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl FromStr for Name {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() > 13 {
            return Err(CodecError::InvalidName(s.to_string()));
        }

        let mut value = 0u64;
        for (i, &c) in bytes.iter().enumerate() {
            let sym = symbol(c).ok_or_else(|| CodecError::InvalidName(s.to_string()))?;
            if i < 12 {
                value |= (sym & 0x1f) << (64 - 5 * (i + 1));
            } else {
                // 13th character only has 4 bits left
                if sym > 0x0f {
                    return Err(CodecError::InvalidName(s.to_string()));
                }
                value |= sym;
            }
        }

        Ok(Self(value))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; 13];
        let mut tmp = self.0;
        for i in 0..13 {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }

        let end = out.iter().rposition(|&c| c != b'.').map_or(0, |p| p + 1);
        // CHARMAP is ascii
        f.write_str(std::str::from_utf8(&out[..end]).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let eosio: Name = "eosio".parse().unwrap();
        assert_eq!(eosio.raw(), 0x5530ea0000000000);

        let active: Name = "active".parse().unwrap();
        assert_eq!(active.raw(), 0x3232eda800000000);

        let owner: Name = "owner".parse().unwrap();
        assert_eq!(owner.raw(), 0xa726ab8000000000);
    }

    #[test]
    fn test_display_trims_trailing_dots() {
        for s in ["eosio", "eosio.wrap", "eosio.msig", "a", "zzzzzzzzzzzzj", "1.2.3"] {
            let n: Name = s.parse().unwrap();
            assert_eq!(n.to_string(), s);
        }
        assert_eq!(Name::default().to_string(), "");
    }

    #[test]
    fn test_constant_matches_parse() {
        const WRAP: Name = Name::constant("eosio.wrap");
        assert_eq!(WRAP, "eosio.wrap".parse().unwrap());
        assert_eq!(Name::constant("zzzzzzzzzzzzj").to_string(), "zzzzzzzzzzzzj");
    }

    #[test]
    fn test_invalid_names() {
        assert!("EOSIO".parse::<Name>().is_err());
        assert!("eos io".parse::<Name>().is_err());
        assert!("toolongaccountname".parse::<Name>().is_err());
        assert!("zzzzzzzzzzzzz".parse::<Name>().is_err());
        assert!("bad6".parse::<Name>().is_err());
    }

    #[test]
    fn test_json_is_string() {
        let n: Name = "eosio.wrap".parse().unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"eosio.wrap\"");
        let back: Name = serde_json::from_str("\"eosio.wrap\"").unwrap();
        assert_eq!(back, n);
    }
}
