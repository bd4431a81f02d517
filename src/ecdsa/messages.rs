//!   Message types exchanged by signing parties
//!
//! Two messages of the first and the second round are sent peer-to-peer, all other messages are broadcast.
//! The wire form is JSON with the variant name in the field `type`. A tag which is not known to this version of the crate
//! decodes to [`Message::Unrecognized`](enum.Message.html#variant.Unrecognized).
#![allow(non_snake_case)]
#![allow(clippy::large_enum_variant)]
use crate::ecdsa::is_valid_curve_point;
use crate::ecdsa::mta::{MessageA, MessageB};
use curv::cryptographic_primitives::proofs::sigma_correct_homomorphic_elgamal_enc::HomoELGamalProof;
use curv::cryptographic_primitives::proofs::sigma_dlog::DLogProof;
use curv::elliptic::curves::traits::ECPoint;
use curv::{BigInt, FE, GE};
use serde::{Deserialize, Serialize};

pub type InMsg = crate::protocol::InputMessage<Message>;
pub type OutMsg = crate::protocol::OutputMessage<Message>;

/// First message of `MtA` protocol with the share $` k_{i} `$, sent to each peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound1Mta {
    pub mta_a: MessageA,
}

/// Initial broadcast of the signing protocol
///
/// Contains commitment to $` g^{\gamma_{i}} `$
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignBroadcastPhase1 {
    pub com: BigInt,
}

/// Bob's responses to the peer's `MessageA`, sent to that peer
///
/// `mta_gamma` shares $` \gamma_{i} `$, `mta_w` shares $` w_{i} `$ and is checked against $` W_{i} `$
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound2 {
    pub mta_gamma: MessageB,
    pub mta_w: MessageB,
}

/// the broadcast of $` \delta_{i} `$, see `Phase3` in the paper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Phase3data {
    pub delta_i: FE,
}

/// Decommitment of $` g^{\gamma_{i}} `$ and ZKP of knowing $` \gamma_{i} `$.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignDecommitPhase4 {
    pub blind_factor: BigInt,
    pub g_gamma_i: GE,
    pub gamma_proof: DLogProof,
}

/// Commitment to $` V_{i} , \space A_{i}, \space B_{i} `$, see `Phase5A` in the paper
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Phase5Com1 {
    pub com: BigInt,
}

/// Decommitment to $` V_{i} , \space A_{i}, \space B_{i} `$ and ZKP of it, see Phase 5B in the paper
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Phase5Decom1 {
    pub V_i: GE,
    pub A_i: GE,
    pub B_i: GE,
    pub blind_factor: BigInt,
    pub proof: HomoELGamalProof,
}

/// Commitment to $` U_{i}, \space T_{i} `$, see `Phase5C` in the paper
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Phase5Com2 {
    pub com: BigInt,
}

/// Decommitment to $` U_{i} , \space T_{i} `$, see Phase 5D in the paper
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Phase5Decom2 {
    pub U_i: GE,
    pub T_i: GE,
    pub blind_factor: BigInt,
}

/// the final broadcast of the signing protocol, partial signature $` s_{i} `$, see `Phase5E`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Phase5Edata {
    pub s_i: FE,
}

/// Messages used by signing algorithm
#[derive(Debug, Clone, Deserialize, Serialize, Display)]
#[serde(tag = "type")]
pub enum Message {
    R1(SignRound1Mta),
    R1b(SignBroadcastPhase1),
    R2(SignRound2),
    R3(Phase3data),
    R4(SignDecommitPhase4),
    R5(Phase5Com1),
    R6(Phase5Decom1),
    R7(Phase5Com2),
    R8(Phase5Decom2),
    R9(Phase5Edata), // signature part
    #[serde(other)]
    Unrecognized,
}

fn non_empty(value: &BigInt, what: &str) -> Result<(), String> {
    if *value > BigInt::zero() {
        Ok(())
    } else {
        Err(format!("{} is empty", what))
    }
}

fn on_curve(point: &GE, what: &str) -> Result<(), String> {
    if is_valid_curve_point(point.get_element()) {
        Ok(())
    } else {
        Err(format!("{} is not a curve point", what))
    }
}

impl Message {
    /// The round whose completion needs the message, `None` for unrecognized messages
    pub fn round(&self) -> Option<u32> {
        match self {
            Message::R1(_) | Message::R1b(_) => Some(1),
            Message::R2(_) => Some(2),
            Message::R3(_) => Some(3),
            Message::R4(_) => Some(4),
            Message::R5(_) => Some(5),
            Message::R6(_) => Some(6),
            Message::R7(_) => Some(7),
            Message::R8(_) => Some(8),
            Message::R9(_) => Some(9),
            Message::Unrecognized => None,
        }
    }

    /// `true` for the variants which are sent to all parties
    pub fn is_broadcast(&self) -> bool {
        !matches!(
            self,
            Message::R1(_) | Message::R2(_) | Message::Unrecognized
        )
    }

    /// Structural checks of the payload which need no protocol state
    pub fn validate_basic(&self) -> Result<(), String> {
        match self {
            Message::R1(m) => non_empty(&m.mta_a.c, "MtA ciphertext"),
            Message::R1b(m) => non_empty(&m.com, "commitment"),
            Message::R2(m) => {
                if m.mta_gamma.validate_basic() && m.mta_w.validate_basic() {
                    Ok(())
                } else {
                    Err("MtA response ciphertext is empty".to_string())
                }
            }
            Message::R3(_) => Ok(()),
            Message::R4(m) => {
                non_empty(&m.blind_factor, "blind factor")?;
                on_curve(&m.g_gamma_i, "g^gamma_i")
            }
            Message::R5(m) => non_empty(&m.com, "commitment"),
            Message::R6(m) => {
                non_empty(&m.blind_factor, "blind factor")?;
                on_curve(&m.V_i, "V_i")?;
                on_curve(&m.A_i, "A_i")?;
                on_curve(&m.B_i, "B_i")
            }
            Message::R7(m) => non_empty(&m.com, "commitment"),
            Message::R8(m) => {
                non_empty(&m.blind_factor, "blind factor")?;
                on_curve(&m.U_i, "U_i")?;
                on_curve(&m.T_i, "T_i")
            }
            Message::R9(_) => Ok(()),
            Message::Unrecognized => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, Phase3data, Phase5Com1, SignBroadcastPhase1};
    use curv::elliptic::curves::traits::ECScalar;
    use curv::{BigInt, FE};

    #[test]
    fn routing() {
        let delta: FE = ECScalar::new_random();
        let r3 = Message::R3(Phase3data { delta_i: delta });
        assert!(r3.is_broadcast());
        assert_eq!(r3.round(), Some(3));
        assert_eq!(format!("{}", r3), "R3");
        assert!(!Message::Unrecognized.is_broadcast());
        assert_eq!(Message::Unrecognized.round(), None);
    }

    #[test]
    fn empty_commitment_is_rejected() {
        let empty = Message::R1b(SignBroadcastPhase1 {
            com: BigInt::zero(),
        });
        assert!(empty.validate_basic().is_err());
        let com = Message::R5(Phase5Com1 {
            com: BigInt::from(42),
        });
        assert!(com.validate_basic().is_ok());
    }
}
