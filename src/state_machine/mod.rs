//!  Channel plumbing of a signing party
//!
//!  A party of the protocol is push-driven: it never reads from a network on its own. Instead it receives messages through [`Party::update`]
//!  and hands its output over to two sinks given at construction time, one for messages to other parties and one for the result of the protocol.
//!  A sink is anything implementing [`OutputSink`]; the module implements the trait for senders of both `crossbeam_channel` and `futures::channel::mpsc`.
//!
//! The module also contains two drivers which connect the party to an input queue. At the high level a driver performs following steps:
//!  * it starts the party, which sends the output of the first round to the outbound sink
//!  * it receives [`Instruction`]s from its input queue and feeds data messages to the party
//!  * errors which leave the party intact, like a message with an unknown sender, are logged and the driver continues
//!  * the driver terminates when the party finishes or fails, when [`Instruction::Terminate`] is received, or when the timeout expires
//!
//! # Async model and futures
//!
//! The module contains two drivers, one which deals with async queues and another, which uses more traditional synchronous queues from `crossbeam_channel` crate. All remaining properties of these drivers are identical.
//!
//! [`Party::update`]: ../ecdsa/signing/local_party/trait.Party.html#tymethod.update
//! [`OutputSink`]: trait.OutputSink.html
//! [`Instruction`]: ../protocol/enum.Instruction.html
//! [`Instruction::Terminate`]: ../protocol/enum.Instruction.html#variant.Terminate
//!
pub mod async_channels;
pub mod sync_channels;

use crate::ecdsa::signing::{Party, PartyError, PartyStatus};
use thiserror::Error;

/// Error returned when the receiving end of a sink is gone
#[derive(Debug, Error)]
#[error("output sink is disconnected")]
pub struct SinkError;

/// One-directional handoff of values produced by a party
///
/// Implementations must not block.
pub trait OutputSink<T>: Send {
    fn deliver(&self, value: T) -> Result<(), SinkError>;
}

impl<T: Send> OutputSink<T> for crossbeam_channel::Sender<T> {
    fn deliver(&self, value: T) -> Result<(), SinkError> {
        self.send(value).map_err(|_| SinkError)
    }
}

impl<T: Send> OutputSink<T> for futures::channel::mpsc::UnboundedSender<T> {
    fn deliver(&self, value: T) -> Result<(), SinkError> {
        self.unbounded_send(value).map_err(|_| SinkError)
    }
}

/// Reasons a driver stops before the party finishes
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Party(#[from] PartyError),
    #[error("timeout expired")]
    Timeout,
    #[error("termination requested")]
    Terminated,
    #[error("input queue is disconnected")]
    Disconnected,
}

/// Outcome of one message fed by a driver, `Some` when the driver has to stop
fn check_progress<P: Party + ?Sized>(
    party: &P,
    result: Result<bool, PartyError>,
) -> Option<Result<(), DriverError>> {
    if let Err(e) = result {
        if party.status() == PartyStatus::Failed {
            return Some(Err(DriverError::Party(e)));
        }
        log::warn!("{}: message rejected: {}", party, e);
    }
    if party.status() == PartyStatus::Finished {
        Some(Ok(()))
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! A party which finishes after a given number of messages, used to test the drivers in isolation
    use crate::ecdsa::signing::{InMsg, Party, PartyError, PartyStatus, SigningError};
    use crate::protocol::PartyId;
    use std::fmt;

    pub struct CountingParty {
        pub id: PartyId,
        pub expected: usize,
        pub received: usize,
        pub status: PartyStatus,
        /// index of the sender whose message fails the party
        pub poison: Option<usize>,
    }

    impl CountingParty {
        pub fn new(expected: usize) -> Self {
            CountingParty {
                id: PartyId::new(0.into(), 0),
                expected,
                received: 0,
                status: PartyStatus::NotStarted,
                poison: None,
            }
        }
    }

    impl fmt::Display for CountingParty {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "id: {}, {}", self.id, self.status)
        }
    }

    impl Party for CountingParty {
        fn start(&mut self) -> Result<(), PartyError> {
            self.status = PartyStatus::Running(1);
            Ok(())
        }

        fn update(&mut self, msg: InMsg) -> Result<bool, PartyError> {
            self.validate_message(&msg)?;
            if self.poison == Some(msg.sender.index) {
                self.status = PartyStatus::Failed;
                return Err(PartyError::new(
                    Some(1),
                    self.id,
                    vec![SigningError::DlogProofFailed { party: msg.sender }],
                ));
            }
            self.received += 1;
            if self.received == self.expected {
                self.status = PartyStatus::Finished;
            }
            Ok(true)
        }

        fn update_from_bytes(
            &mut self,
            _bytes: &[u8],
            _from: &PartyId,
            _is_broadcast: bool,
        ) -> Result<bool, PartyError> {
            unimplemented!()
        }

        fn validate_message(&self, msg: &InMsg) -> Result<(), PartyError> {
            if msg.sender.index > 9 {
                return Err(PartyError::new(
                    None,
                    self.id,
                    vec![SigningError::InvalidSender {
                        index: msg.sender.index,
                        max: 9,
                    }],
                ));
            }
            Ok(())
        }

        fn store_message(&mut self, _msg: InMsg) -> Result<bool, PartyError> {
            Ok(true)
        }

        fn party_id(&self) -> &PartyId {
            &self.id
        }

        fn status(&self) -> PartyStatus {
            self.status
        }
    }
}
