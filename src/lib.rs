//! The crate contains one party of the multiparty threshold signing protocol
//! based on the work of Rosario Gennaro and Steven Goldfeder
//! ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf).
//!
//! A group of `N` players holds Shamir shares of an ECDSA key. Any subgroup of `t+1` players can sign a message
//! without reconstructing the key. The crate runs the signing side of the scheme; the shares come from a key generation protocol
//! executed elsewhere and are loaded as [`MultiPartyInfo`](./ecdsa/keys/struct.MultiPartyInfo.html).
//! The scheme is based on ECDSA standard with the elliptic curve secp256k1 , which can be substituted by other curves.
//!
//! Cryptographic protocols are implemented by [`ecdsa`](./ecdsa/index.html) module.
//! The signing party is implemented in [`ecdsa::signing`](./ecdsa/signing/index.html) module.
//! Drivers which connect a party to message queues are implemented in [`state_machine`](./state_machine/index.html) module.
#![allow(
    clippy::must_use_candidate,
    clippy::items_after_statements,
    clippy::module_name_repetitions,
    clippy::unseparated_literal_suffix,
    //
    clippy::missing_errors_doc, // remove at some point
    clippy::used_underscore_binding // if turned on, seems to generate a lot of false positive
)]
pub mod ecdsa;
pub mod protocol;
pub mod state_machine;

#[macro_use]
extern crate strum_macros;

pub use ecdsa::signing::{LocalParty, Parameters, Party, PartyError, SignatureData};
pub use ecdsa::Signature;
