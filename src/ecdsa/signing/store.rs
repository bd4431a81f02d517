//! Buffer of received messages
//!
//! Keeps one slot array per message variant. Slots are addressed by the session index of the sender.
//! A message which arrives for an already filled slot replaces the previous one, so a round always sees the latest message of each sender.
//! Replays are not detected here: authentication and de-duplication of the transport are the responsibility of the caller.
use crate::ecdsa::messages::{
    Message, Phase3data, Phase5Com1, Phase5Com2, Phase5Decom1, Phase5Decom2, Phase5Edata,
    SignBroadcastPhase1, SignDecommitPhase4, SignRound1Mta, SignRound2,
};
use crate::ecdsa::signing::SigningError;

/// Fixed-size array of optional messages, one per party
#[derive(Debug, Clone)]
pub struct Slots<T> {
    slots: Vec<Option<T>>,
}

impl<T> Slots<T> {
    pub fn new(party_count: usize) -> Self {
        Slots {
            slots: (0..party_count).map(|_| None).collect(),
        }
    }

    /// stores the message of party `index`, returns `true` if an earlier message was overwritten
    pub fn put(&mut self, index: usize, msg: T) -> Result<bool, SigningError> {
        let max = self.slots.len().saturating_sub(1);
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SigningError::InvalidSender { index, max })?;
        Ok(slot.replace(msg).is_some())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// `true` if every slot except the one of the local party is filled
    pub fn is_complete(&self, own_index: usize) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(i, slot)| i == own_index || slot.is_some())
    }

    /// number of filled slots
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// filled slots with the index of their sender
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|m| (i, m)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One slot array per message variant
#[derive(Debug, Clone)]
pub struct MessageStore {
    pub round1_mta: Slots<SignRound1Mta>,
    pub round1_commit: Slots<SignBroadcastPhase1>,
    pub round2: Slots<SignRound2>,
    pub round3: Slots<Phase3data>,
    pub round4: Slots<SignDecommitPhase4>,
    pub round5: Slots<Phase5Com1>,
    pub round6: Slots<Phase5Decom1>,
    pub round7: Slots<Phase5Com2>,
    pub round8: Slots<Phase5Decom2>,
    pub round9: Slots<Phase5Edata>,
}

impl MessageStore {
    pub fn new(party_count: usize) -> Self {
        MessageStore {
            round1_mta: Slots::new(party_count),
            round1_commit: Slots::new(party_count),
            round2: Slots::new(party_count),
            round3: Slots::new(party_count),
            round4: Slots::new(party_count),
            round5: Slots::new(party_count),
            round6: Slots::new(party_count),
            round7: Slots::new(party_count),
            round8: Slots::new(party_count),
            round9: Slots::new(party_count),
        }
    }

    /// Routes the body into the slot of its variant
    ///
    /// Returns `Ok(false)` for an unrecognized message, which is not stored.
    pub fn store(&mut self, sender: usize, body: Message) -> Result<bool, SigningError> {
        let overwritten = match body {
            Message::R1(m) => self.round1_mta.put(sender, m)?,
            Message::R1b(m) => self.round1_commit.put(sender, m)?,
            Message::R2(m) => self.round2.put(sender, m)?,
            Message::R3(m) => self.round3.put(sender, m)?,
            Message::R4(m) => self.round4.put(sender, m)?,
            Message::R5(m) => self.round5.put(sender, m)?,
            Message::R6(m) => self.round6.put(sender, m)?,
            Message::R7(m) => self.round7.put(sender, m)?,
            Message::R8(m) => self.round8.put(sender, m)?,
            Message::R9(m) => self.round9.put(sender, m)?,
            Message::Unrecognized => return Ok(false),
        };
        if overwritten {
            log::debug!("message from party {} replaced an earlier one", sender);
        }
        Ok(true)
    }

    /// total number of stored messages
    pub fn count(&self) -> usize {
        self.round1_mta.count()
            + self.round1_commit.count()
            + self.round2.count()
            + self.round3.count()
            + self.round4.count()
            + self.round5.count()
            + self.round6.count()
            + self.round7.count()
            + self.round8.count()
            + self.round9.count()
    }
}
