//!  Party driver
//!
//!  Feeds a party with messages from a synchronous queue.
//!  Unlike its async version, this driver uses receiver queue type from crate `crossbeam_channel`
//!  See details in similar [`Async party driver`]
//!
//!
//! [`Async party driver`]: ../async_channels/index.html
//!
use crate::ecdsa::signing::{InMsg, Party, PartyStatus};
use crate::protocol::Instruction;
use crate::state_machine::{check_progress, DriverError};
use crossbeam_channel::{after, Receiver};
use std::time::{Duration, Instant};

/// Party driver
///
/// See [`async_channels::PartyDriver`](../async_channels/struct.PartyDriver.html)
pub struct PartyDriver<'a, P>
where
    P: Party,
{
    party: P,
    inqueue: &'a Receiver<Instruction<InMsg>>,
    timeout: Option<Duration>,
}

impl<'a, P: Party> PartyDriver<'a, P> {
    pub fn new(
        party: P,
        inqueue: &'a Receiver<Instruction<InMsg>>,
        timeout: Option<Duration>,
    ) -> Self {
        PartyDriver {
            party,
            inqueue,
            timeout,
        }
    }

    pub fn party(&self) -> &P {
        &self.party
    }

    pub fn into_party(self) -> P {
        self.party
    }

    /// Starts the party if needed and feeds it until it finishes
    pub fn execute(&mut self) -> Result<(), DriverError> {
        log::trace!("starting party driver");
        let timeout: Option<Receiver<Instant>> = self.timeout.map(after);

        if self.party.status() == PartyStatus::NotStarted {
            self.party.start()?;
        }

        loop {
            if self.party.status() == PartyStatus::Finished {
                return Ok(());
            }
            let received = match timeout.as_ref() {
                Some(timeout_receiver) => crossbeam_channel::select! {
                    recv(self.inqueue) -> result => result.map_err(|_| DriverError::Disconnected),
                    recv(timeout_receiver) -> _ => Err(DriverError::Timeout),
                },
                None => self
                    .inqueue
                    .recv()
                    .map_err(|_| DriverError::Disconnected),
            };
            let instruction = match received {
                Ok(instruction) => instruction,
                Err(e) => {
                    log::error!("{}: driver stops: {}", self.party, e);
                    return Err(e);
                }
            };

            match instruction {
                Instruction::Data(msg) => {
                    let result = self.party.update(msg);
                    if let Some(outcome) = check_progress(&self.party, result) {
                        return outcome;
                    }
                }
                Instruction::Terminate => {
                    log::debug!("{}: termination requested", self.party);
                    return Err(DriverError::Terminated);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PartyDriver;
    use crate::ecdsa::hash_message;
    use crate::ecdsa::keys::dealer::deal;
    use crate::ecdsa::signing::{InMsg, LocalParty, Message, OutMsg, Parameters, PartyStatus};
    use crate::protocol::{Address, Instruction, PartyId, PartyKey};
    use crate::state_machine::mock::CountingParty;
    use crate::state_machine::DriverError;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::thread;
    use std::time::Duration;

    fn message_from(index: usize) -> Instruction<InMsg> {
        Instruction::Data(InMsg {
            sender: PartyId::new(PartyKey::from(index), index),
            is_broadcast: false,
            body: Message::Unrecognized,
        })
    }

    #[test]
    fn finishes_after_expected_input() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (ingress, rx) = unbounded();
        for i in 1..=3 {
            ingress.send(message_from(i)).unwrap();
        }
        // rejected by the party, the driver carries on
        ingress.send(message_from(42)).unwrap();
        ingress.send(message_from(4)).unwrap();

        let mut driver = PartyDriver::new(CountingParty::new(4), &rx, None);
        assert!(driver.execute().is_ok());
        assert_eq!(driver.party().received, 4);
        assert_eq!(driver.party().status, PartyStatus::Finished);
    }

    #[test]
    fn stops_when_party_fails() {
        let (ingress, rx) = unbounded();
        ingress.send(message_from(1)).unwrap();
        ingress.send(message_from(2)).unwrap();
        let mut party = CountingParty::new(3);
        party.poison = Some(2);

        let mut driver = PartyDriver::new(party, &rx, None);
        match driver.execute() {
            Err(DriverError::Party(e)) => assert_eq!(e.culprits().len(), 1),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(driver.party().received, 1);
    }

    #[test]
    fn timed_out() {
        let _ = env_logger::builder().is_test(true).try_init();

        let timeout_in_millis = 300;
        let (ingress, rx) = unbounded();
        let client = thread::spawn(move || {
            ingress.send(message_from(1)).unwrap();
            thread::sleep(Duration::from_millis(timeout_in_millis + 500));
            let _ = ingress.send(message_from(2));
        });

        let mut driver = PartyDriver::new(
            CountingParty::new(2),
            &rx,
            Some(Duration::from_millis(timeout_in_millis)),
        );
        assert!(matches!(driver.execute(), Err(DriverError::Timeout)));
        assert_eq!(driver.party().received, 1);
        client.join().unwrap();
    }

    #[test]
    fn terminated_and_disconnected() {
        let (ingress, rx) = unbounded();
        ingress.send(message_from(1)).unwrap();
        ingress.send(Instruction::Terminate).unwrap();
        let mut driver = PartyDriver::new(CountingParty::new(3), &rx, None);
        assert!(matches!(driver.execute(), Err(DriverError::Terminated)));

        drop(ingress);
        let mut driver = PartyDriver::new(CountingParty::new(3), &rx, None);
        assert!(matches!(driver.execute(), Err(DriverError::Disconnected)));
    }

    fn relay(sender: PartyId, out: Receiver<OutMsg>, peers: Vec<(PartyId, Sender<Instruction<InMsg>>)>) {
        for msg in out.iter() {
            for (peer, tx) in &peers {
                let is_broadcast = msg.is_broadcast();
                if is_broadcast || msg.recipient == Address::Peer(*peer) {
                    let _ = tx.send(Instruction::Data(InMsg {
                        sender,
                        is_broadcast,
                        body: msg.body.clone(),
                    }));
                }
            }
        }
    }

    #[test]
    fn signing_parties_in_threads() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let keys = (1..=3).map(PartyKey::from).collect::<Vec<_>>();
        let (public_key, infos) = deal(1, &keys);
        let message_hash = hash_message(b"threads");

        let mut parties = Vec::new();
        let mut inboxes = Vec::new();
        for (key, info) in keys.iter().zip(infos.iter()) {
            let params = Parameters::new(&keys, *key, 1)?;
            let (out_tx, out_rx) = unbounded();
            let (end_tx, end_rx) = unbounded();
            let (in_tx, in_rx) = unbounded();
            let party = LocalParty::new(message_hash, params, info, out_tx, end_tx)?;
            inboxes.push((*party.params().own_id(), in_tx));
            parties.push((party, out_rx, end_rx, in_rx));
        }

        let mut workers = Vec::new();
        for (party, out_rx, end_rx, in_rx) in parties {
            let own = *party.params().own_id();
            let peers = inboxes
                .iter()
                .filter(|(id, _)| *id != own)
                .cloned()
                .collect::<Vec<_>>();
            thread::spawn(move || relay(own, out_rx, peers));
            workers.push(thread::spawn(move || {
                let mut driver = PartyDriver::new(party, &in_rx, Some(Duration::from_secs(120)));
                driver.execute().map(|_| end_rx.recv())
            }));
        }

        for worker in workers {
            let signature = worker.join().expect("worker panicked")??;
            assert!(signature.signature.verify(&public_key, &message_hash));
        }
        Ok(())
    }
}
