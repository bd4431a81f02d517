//! Wire format of signing messages
//!
//! Messages are JSON objects tagged with the name of their variant in the field `type`.
//! An object with an unknown tag is decoded as [`Message::Unrecognized`](../../messages/enum.Message.html#variant.Unrecognized), so that a party can skip messages of newer peers.
use crate::ecdsa::messages::Message;
use crate::ecdsa::signing::SigningError;

/// Decodes a message received from a network
pub fn parse_wire_message(bytes: &[u8]) -> Result<Message, SigningError> {
    serde_json::from_slice(bytes).map_err(|e| SigningError::Wire(e.to_string()))
}

/// Encodes a message to be sent over a network
pub fn to_wire_bytes(msg: &Message) -> Result<Vec<u8>, SigningError> {
    serde_json::to_vec(msg).map_err(|e| SigningError::Wire(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{parse_wire_message, to_wire_bytes};
    use crate::ecdsa::messages::{Message, Phase3data, Phase5Edata};
    use crate::ecdsa::signing::SigningError;
    use curv::elliptic::curves::traits::ECScalar;
    use curv::FE;

    #[test]
    fn decodes_encoded_message() -> anyhow::Result<()> {
        let delta_i: FE = ECScalar::new_random();
        let bytes = to_wire_bytes(&Message::R3(Phase3data { delta_i }))?;
        assert!(std::str::from_utf8(&bytes)?.contains("\"type\":\"R3\""));
        match parse_wire_message(&bytes)? {
            Message::R3(m) => assert_eq!(m.delta_i, delta_i),
            other => panic!("unexpected message {}", other),
        }
        Ok(())
    }

    #[test]
    fn unknown_type_is_unrecognized() -> anyhow::Result<()> {
        let msg = parse_wire_message(br#"{"type":"R10","payload":[1,2,3]}"#)?;
        assert!(matches!(msg, Message::Unrecognized));
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_wire_message(b"not a message"),
            Err(SigningError::Wire(_))
        ));
        let s_i: FE = ECScalar::new_random();
        let mut bytes = to_wire_bytes(&Message::R9(Phase5Edata { s_i })).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(
            parse_wire_message(&bytes),
            Err(SigningError::Wire(_))
        ));
    }
}
