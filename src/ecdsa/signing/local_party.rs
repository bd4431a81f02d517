//! The local party of a signing session
//!
//! [`LocalParty`] owns everything one participant needs: parameters of the session, its view of the key, the store of received messages and the intermediate values.
//! The party does not read from a network. The caller pushes messages into it with `update`, and the party pushes its messages and the signature
//! into the sinks given at construction time.
use crate::ecdsa::keys::{KeyShareView, MultiPartyInfo};
use crate::ecdsa::messages::{InMsg, Message, OutMsg};
use crate::ecdsa::signing::params::Parameters;
use crate::ecdsa::signing::rounds::{BoxedRound, Round, Round1, RoundContext, Transition};
use crate::ecdsa::signing::scratch::ScratchData;
use crate::ecdsa::signing::store::MessageStore;
use crate::ecdsa::signing::{wire, ErrorState, PartyError, SignatureData, SigningError};
use crate::ecdsa::MessageHashType;
use crate::protocol::PartyId;
use crate::state_machine::OutputSink;
use curv::{FE, GE};
use std::fmt;

/// Lifecycle of a party
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartyStatus {
    NotStarted,
    Running(u32),
    Finished,
    Failed,
}

impl fmt::Display for PartyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyStatus::NotStarted => write!(f, "not started"),
            PartyStatus::Running(round) => write!(f, "round: {}", round),
            PartyStatus::Finished => write!(f, "finished"),
            PartyStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Interface of a protocol participant
pub trait Party: fmt::Display + Send {
    /// Starts the first round
    fn start(&mut self) -> Result<(), PartyError>;
    /// Validates and stores the message, then advances as many rounds as the stored input allows
    ///
    /// Returns `Ok(false)` if the message was not recognized and is ignored.
    fn update(&mut self, msg: InMsg) -> Result<bool, PartyError>;
    /// Parses the message from its wire format and calls [`update`](#tymethod.update)
    fn update_from_bytes(
        &mut self,
        bytes: &[u8],
        from: &PartyId,
        is_broadcast: bool,
    ) -> Result<bool, PartyError>;
    /// Checks the message against the session without touching the state of the party
    fn validate_message(&self, msg: &InMsg) -> Result<(), PartyError>;
    /// Puts the message into the slot of its sender
    fn store_message(&mut self, msg: InMsg) -> Result<bool, PartyError>;
    fn party_id(&self) -> &PartyId;
    fn status(&self) -> PartyStatus;
}

/// One participant of a signing session
pub struct LocalParty {
    params: Parameters,
    keys: KeyShareView,
    temp: ScratchData,
    store: MessageStore,
    round: Option<BoxedRound>,
    status: PartyStatus,
    out: Box<dyn OutputSink<OutMsg>>,
    end: Box<dyn OutputSink<SignatureData>>,
}

impl LocalParty {
    /// Creates the party which signs `message_hash` with the key as it is
    pub fn new<O, E>(
        message_hash: MessageHashType,
        params: Parameters,
        key: &MultiPartyInfo,
        out: O,
        end: E,
    ) -> Result<Self, PartyError>
    where
        O: OutputSink<OutMsg> + 'static,
        E: OutputSink<SignatureData> + 'static,
    {
        Self::with_key_derivation(message_hash, params, key, None, out, end)
    }

    /// Creates the party which signs `message_hash` with the key shifted by `key_derivation_delta`
    ///
    /// Every share of the key is incremented by the delta, so that the signature verifies against $` Y + g^{\delta} `$.
    pub fn with_key_derivation<O, E>(
        message_hash: MessageHashType,
        params: Parameters,
        key: &MultiPartyInfo,
        key_derivation_delta: Option<FE>,
        out: O,
        end: E,
    ) -> Result<Self, PartyError>
    where
        O: OutputSink<OutMsg> + 'static,
        E: OutputSink<SignatureData> + 'static,
    {
        let own_id = *params.own_id();
        let mut keys = key
            .subset(&params)
            .map_err(|e| PartyError::new(None, own_id, vec![e]))?;
        if let Some(delta) = key_derivation_delta.as_ref() {
            keys.derive(delta);
        }
        let party_count = params.party_count();
        Ok(LocalParty {
            params,
            keys,
            temp: ScratchData::new(message_hash, key_derivation_delta),
            store: MessageStore::new(party_count),
            round: None,
            status: PartyStatus::NotStarted,
            out: Box::new(out),
            end: Box::new(end),
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// the key the signature of the session verifies against
    pub fn public_key(&self) -> &GE {
        &self.keys.public_key
    }

    /// number of messages held by the store
    pub fn stored_messages(&self) -> usize {
        self.store.count()
    }

    #[cfg(test)]
    pub(crate) fn intermediate_values(&self) -> usize {
        self.temp.filled()
    }

    fn current_round(&self) -> Option<u32> {
        match self.status {
            PartyStatus::Running(round) => Some(round),
            _ => None,
        }
    }

    /// error which leaves the party as it is
    fn rejection(&self, error: SigningError) -> PartyError {
        PartyError::new(self.current_round(), *self.params.own_id(), vec![error])
    }

    fn malformed(&self, msg: &InMsg, reason: String) -> PartyError {
        self.rejection(SigningError::MalformedMessage {
            party: msg.sender,
            kind: msg.body.to_string(),
            reason,
        })
    }

    /// error which terminates the session
    fn fail(&mut self, round: u32, error_state: ErrorState) -> PartyError {
        self.status = PartyStatus::Failed;
        self.round = None;
        let discarded = self.temp.discard();
        let error = PartyError::new(
            Some(round),
            *self.params.own_id(),
            error_state.into_errors(),
        );
        log::error!("{}: {}", self, error);
        log::debug!("{}: {} sets of intermediate values discarded", self, discarded);
        error
    }

    fn start_round(&mut self, round: &mut BoxedRound) -> Result<(), PartyError> {
        let mut ctx = RoundContext {
            params: &self.params,
            keys: &self.keys,
            store: &self.store,
            temp: &mut self.temp,
        };
        match round.start(&mut ctx) {
            Ok(output) => {
                for m in output {
                    if let Err(e) = self.out.deliver(m) {
                        log::error!("{}: cannot send out message: {}", self, e);
                    }
                }
                Ok(())
            }
            Err(e) => Err(self.fail(round.number(), e)),
        }
    }

    /// consumes rounds as long as their input is complete
    fn advance(&mut self) -> Result<(), PartyError> {
        while let Some(round) = self.round.take() {
            let number = round.number();
            if !round.is_input_complete(&self.store, self.params.own_index()) {
                self.round = Some(round);
                return Ok(());
            }

            log::debug!("{}: consuming input of {:?}", self, round);
            let mut ctx = RoundContext {
                params: &self.params,
                keys: &self.keys,
                store: &self.store,
                temp: &mut self.temp,
            };
            match round.consume(&mut ctx) {
                Ok(Transition::NextRound(mut next)) => {
                    self.status = PartyStatus::Running(next.number());
                    self.start_round(&mut next)?;
                    self.round = Some(next);
                }
                Ok(Transition::Finished(signature)) => {
                    self.status = PartyStatus::Finished;
                    let discarded = self.temp.discard();
                    log::info!(
                        "{}: signature is ready, {} sets of intermediate values discarded",
                        self,
                        discarded
                    );
                    if let Err(e) = self.end.deliver(signature) {
                        log::error!("{}: cannot deliver the signature: {}", self, e);
                    }
                    return Ok(());
                }
                Err(e) => return Err(self.fail(number, e)),
            }
        }
        Ok(())
    }
}

impl Party for LocalParty {
    fn start(&mut self) -> Result<(), PartyError> {
        if self.status != PartyStatus::NotStarted {
            return Err(self.rejection(SigningError::InvalidState(format!(
                "cannot start a party in state \"{}\"",
                self.status
            ))));
        }
        log::info!("{}: starting session {}", self, self.params);
        if self.temp.key_derivation_delta.is_some() {
            log::info!("{}: signing with derived key {:?}", self, self.keys.public_key);
        }

        let mut round1 = Round1::new();
        let ctx = RoundContext {
            params: &self.params,
            keys: &self.keys,
            store: &self.store,
            temp: &mut self.temp,
        };
        if let Err(e) = round1.prepare(&ctx) {
            return Err(self.fail(1, e));
        }

        self.status = PartyStatus::Running(1);
        let mut round: BoxedRound = Box::new(round1);
        self.start_round(&mut round)?;
        self.round = Some(round);
        // messages of fast peers may have arrived before the start
        self.advance()
    }

    fn update(&mut self, msg: InMsg) -> Result<bool, PartyError> {
        if let PartyStatus::Finished | PartyStatus::Failed = self.status {
            return Err(self.rejection(SigningError::InvalidState(format!(
                "cannot update a party in state \"{}\"",
                self.status
            ))));
        }
        self.validate_message(&msg)?;
        if !self.store_message(msg)? {
            return Ok(false);
        }
        if self.round.is_some() {
            self.advance()?;
        }
        Ok(true)
    }

    fn update_from_bytes(
        &mut self,
        bytes: &[u8],
        from: &PartyId,
        is_broadcast: bool,
    ) -> Result<bool, PartyError> {
        let body = wire::parse_wire_message(bytes).map_err(|e| self.rejection(e))?;
        self.update(InMsg {
            sender: *from,
            is_broadcast,
            body,
        })
    }

    fn validate_message(&self, msg: &InMsg) -> Result<(), PartyError> {
        let expected = match self.params.party(msg.sender.index) {
            Some(party) => party,
            None => {
                return Err(self.rejection(SigningError::InvalidSender {
                    index: msg.sender.index,
                    max: self.params.party_count() - 1,
                }))
            }
        };
        if expected.key != msg.sender.key {
            return Err(self.malformed(
                msg,
                format!("sender key differs from the key of party {}", expected),
            ));
        }
        if msg.sender.index == self.params.own_index() {
            return Err(self.malformed(msg, "message from the local party".to_string()));
        }
        if let Message::Unrecognized = msg.body {
            return Ok(());
        }
        if msg.body.is_broadcast() != msg.is_broadcast {
            return Err(self.malformed(
                msg,
                format!(
                    "broadcast flag is {}, the message is {}",
                    msg.is_broadcast,
                    if msg.body.is_broadcast() {
                        "broadcast"
                    } else {
                        "point-to-point"
                    }
                ),
            ));
        }
        msg.body
            .validate_basic()
            .map_err(|reason| self.malformed(msg, reason))
    }

    fn store_message(&mut self, msg: InMsg) -> Result<bool, PartyError> {
        self.validate_message(&msg)?;
        if let Message::Unrecognized = msg.body {
            log::warn!("{}: ignoring unrecognized message from {}", self, msg.sender);
            return Ok(false);
        }
        let sender = msg.sender;
        log::trace!("{}: storing {} from {}", self, msg.body, sender);
        self.store
            .store(sender.index, msg.body)
            .map_err(|e| self.rejection(e))
    }

    fn party_id(&self) -> &PartyId {
        self.params.own_id()
    }

    fn status(&self) -> PartyStatus {
        self.status
    }
}

impl fmt::Display for LocalParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id: {}, {}", self.params.own_id(), self.status)
    }
}
