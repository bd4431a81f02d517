//! Defines some common data types

#![allow(clippy::large_enum_variant)]
use core::cmp::Ordering;
use core::fmt::{Error, Formatter};
use hex::FromHexError;
use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use anyhow::bail;
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt::{Debug, Display};

/// Long-term identity of a party
///
/// Opaque key whose binding to a network address has to be defined outside of the crate.
/// Uses 32 byte slice to fit a public 256 bit key of an elliptic curve schema.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct PartyKey(pub [u8; 32]);

impl PartyKey {
    pub fn from_slice(slice: &[u8]) -> anyhow::Result<Self> {
        if slice.len() != 32 {
            bail!("Slice is required to be 32 bytes long");
        }

        Ok({
            let mut result = [0u8; 32];
            result.clone_from_slice(slice);
            PartyKey(result)
        })
    }

    fn write_as_hex_str(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.0.iter().rev().try_for_each(|x| write!(f, "{:02X}", x))
    }
}

impl Default for PartyKey {
    fn default() -> Self {
        PartyKey([0u8; 32])
    }
}

impl Display for PartyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.write_as_hex_str(f)
    }
}

impl Debug for PartyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.write_as_hex_str(f)
    }
}

impl From<usize> for PartyKey {
    fn from(x: usize) -> Self {
        let mut result = [0u8; 32];
        let bytes = x.to_le_bytes();
        result[..bytes.len()].clone_from_slice(&bytes);
        PartyKey(result)
    }
}

impl Ord for PartyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.eq(other) {
            return Equal;
        }
        if self.0.iter().lt(other.0.iter()) {
            Less
        } else {
            Greater
        }
    }
}

impl PartialOrd for PartyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for PartyKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}", self))
    }
}

impl<'a> Deserialize<'a> for PartyKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'a>,
    {
        struct MyVisitor;

        impl<'a> Visitor<'a> for MyVisitor {
            type Value = PartyKey;

            fn expecting(&self, formatter: &mut Formatter) -> Result<(), Error> {
                formatter.write_str("a 32 byte array in hex notation")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let mut bytes = hex::decode(v).map_err(|e| match e {
                    FromHexError::InvalidHexCharacter { c, index } => E::invalid_value(
                        de::Unexpected::Char(c),
                        &format!("Unexpected character {:?} as position {}", c, index).as_str(),
                    ),
                    FromHexError::InvalidStringLength => {
                        E::invalid_length(v.len(), &"Unexpected length of hex string")
                    }
                    FromHexError::OddLength => {
                        E::invalid_length(v.len(), &"Odd length of hex string")
                    }
                })?;
                if bytes.len() != 32 {
                    return Err(E::invalid_length(bytes.len(), &"32 bytes"));
                }
                bytes.reverse();
                let mut result = [0u8; 32];
                result.clone_from_slice(&bytes);
                Ok(PartyKey(result))
            }
        }

        deserializer.deserialize_str(MyVisitor)
    }
}

/// Identity of a party within one signing session
///
/// `index` is the dense position of the party in the session's party list sorted by `key`.
/// It is assigned by [`Parameters`](../ecdsa/signing/params/struct.Parameters.html) and is only meaningful inside that session.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct PartyId {
    pub key: PartyKey,
    pub index: usize,
}

impl PartyId {
    pub fn new(key: PartyKey, index: usize) -> Self {
        PartyId { key, index }
    }
}

impl Display for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{{{}, {}}}", self.index, self.key)
    }
}

/// Message destination address type
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum Address {
    Peer(PartyId),
    Broadcast,
}

/// Incoming message wrapper
///
/// `is_broadcast` is reported by the transport and is checked against the routing of the body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputMessage<BodyType> {
    pub sender: PartyId,
    pub is_broadcast: bool,
    pub body: BodyType,
}

/// Outgoing message wrapper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputMessage<BodyType> {
    pub recipient: Address,
    pub body: BodyType,
}

impl<BodyType> OutputMessage<BodyType> {
    pub fn is_broadcast(&self) -> bool {
        self.recipient == Address::Broadcast
    }
}

/// Special wrapper for an input of a party driver. Enables termination of the driver via sending a message to it
#[derive(Debug, Clone)]
pub enum Instruction<T> {
    Data(T),
    Terminate,
}

#[cfg(test)]
mod tests {
    use super::{PartyId, PartyKey};

    #[test]
    fn serde() -> anyhow::Result<()> {
        let x = PartyKey::from(65535 as usize);

        let y = serde_json::to_string(&x)?;

        assert_eq!(
            y,
            "\"000000000000000000000000000000000000000000000000000000000000FFFF\""
        );

        let result: PartyKey = serde_json::from_str(&y)?;

        assert_eq!(result, x);

        let result: PartyKey = serde_json::from_str(
            "\"0000000000000000000000000000000000000000000000000000000000000002\"",
        )?;

        assert_eq!(result, PartyKey::from(2));
        Ok(())
    }

    #[test]
    fn keys_are_ordered_lexicographically() {
        let mut keys = vec![PartyKey::from(3), PartyKey::from(1), PartyKey::from(2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![PartyKey::from(1), PartyKey::from(2), PartyKey::from(3)]
        );
        assert!(PartyKey::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn party_id_serde() -> anyhow::Result<()> {
        let id = PartyId::new(PartyKey::from(7), 2);
        let json = serde_json::to_string(&id)?;
        let back: PartyId = serde_json::from_str(&json)?;
        assert_eq!(back, id);
        assert_eq!(
            format!("{}", id),
            "{2, 0000000000000000000000000000000000000000000000000000000000000007}"
        );
        Ok(())
    }
}
