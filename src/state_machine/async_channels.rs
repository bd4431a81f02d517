//! Party driver
//!
//! Feeds a party with messages from an async queue.
//!
//! This version of the driver utilizes async/await model of RUST. The input queue type is from [`futures::channel::mpsc`]

use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use tokio::time;

use crate::ecdsa::signing::{InMsg, Party, PartyStatus};
use crate::protocol::Instruction;
use crate::state_machine::{check_progress, DriverError};
use std::time::Duration;

/// Party driver
///
///  The driver owns the party and the receiving end of its input queue.
///  The output of the party does not pass through the driver: it goes directly to the sinks the party was created with.
///
///  Several parties of different sessions can be driven concurrently as long as each driver gets its own queue.
///  When several distributed nodes execute same network protocol, it is very common case when some nodes are faster then others so that their messages arrive to destinations early.
///  The party stores such messages and uses them when it gets to their round, so the driver never has to hold messages back.
pub struct PartyDriver<P>
where
    P: Party,
{
    party: P,
    inqueue: UnboundedReceiver<Instruction<InMsg>>,
    timeout: Option<Duration>,
}

impl<P> PartyDriver<P>
where
    P: Party,
{
    /// Create new driver, `timeout` limits the entire run of the party
    pub fn new(
        party: P,
        inqueue: UnboundedReceiver<Instruction<InMsg>>,
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

    /// Execute main loop of the driver.
    pub async fn execute(&mut self) -> Result<(), DriverError> {
        log::trace!("starting party driver");

        if self.party.status() == PartyStatus::NotStarted {
            self.party.start()?;
        }

        let timeout = self.timeout;
        let driving_result = match timeout {
            Some(t) => time::timeout(t, self.drive_to_completion()).await.ok(),
            None => Some(self.drive_to_completion().await),
        };

        driving_result.unwrap_or_else(|| {
            log::error!("{}: timeout expired", self.party);
            Err(DriverError::Timeout)
        })
    }

    /// Drives the party loop to completion.
    async fn drive_to_completion(&mut self) -> Result<(), DriverError> {
        loop {
            if self.party.status() == PartyStatus::Finished {
                return Ok(());
            }
            match self.inqueue.next().await {
                Some(Instruction::Data(msg)) => {
                    log::trace!("message received");
                    let result = self.party.update(msg);
                    if let Some(outcome) = check_progress(&self.party, result) {
                        return outcome;
                    }
                }
                Some(Instruction::Terminate) => {
                    log::debug!("{}: termination requested", self.party);
                    return Err(DriverError::Terminated);
                }
                None => {
                    log::error!("{}: stream terminated", self.party);
                    return Err(DriverError::Disconnected);
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
    use crate::ecdsa::signing::{InMsg, LocalParty, Message, Parameters, PartyStatus};
    use crate::protocol::{Address, Instruction, PartyId, PartyKey};
    use crate::state_machine::mock::CountingParty;
    use crate::state_machine::DriverError;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;

    fn message_from(index: usize) -> Instruction<InMsg> {
        Instruction::Data(InMsg {
            sender: PartyId::new(PartyKey::from(index), index),
            is_broadcast: false,
            body: Message::Unrecognized,
        })
    }

    #[tokio::test]
    async fn finishes_after_expected_input() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        for i in vec![1, 2, 42, 3] {
            let _ = ingress.send(message_from(i)).await;
        }

        let mut driver = PartyDriver::new(CountingParty::new(3), rx, None);
        assert!(driver.execute().await.is_ok());
        assert_eq!(driver.party().received, 3);
    }

    #[tokio::test]
    async fn one_message_with_timeout() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        let _ = ingress.send(message_from(1)).await;

        let mut driver =
            PartyDriver::new(CountingParty::new(2), rx, Some(Duration::from_millis(100)));
        assert!(matches!(driver.execute().await, Err(DriverError::Timeout)));
        assert_eq!(driver.party().received, 1);
    }

    #[tokio::test]
    async fn termination() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        let (tx_result, rx_result) = futures::channel::oneshot::channel();

        tokio::spawn(async {
            let mut driver = PartyDriver::new(CountingParty::new(5), rx, None);
            log::info!("starting driver");
            let result = driver.execute().await;
            log::info!("driver stopped");
            let _ = tx_result.send((result, driver.party().received));
        });

        // enough to get the party going, but not to let it finish
        for i in 1..=3 {
            let _ = ingress.send(message_from(i)).await;
        }
        let _ = ingress.send(Instruction::Terminate).await;

        let (result, received) = rx_result.await.expect("driver task dropped the result");
        assert!(matches!(result, Err(DriverError::Terminated)));
        assert_eq!(received, 3);
    }

    #[tokio::test]
    async fn failed_party_stops_driver() {
        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        let _ = ingress.send(message_from(3)).await;
        let mut party = CountingParty::new(2);
        party.poison = Some(3);

        let mut driver = PartyDriver::new(party, rx, None);
        assert!(matches!(driver.execute().await, Err(DriverError::Party(_))));
        assert_eq!(driver.party().status, PartyStatus::Failed);

        drop(ingress);
        let (ingress, rx) = futures::channel::mpsc::unbounded::<Instruction<InMsg>>();
        drop(ingress);
        let mut driver = PartyDriver::new(CountingParty::new(2), rx, None);
        assert!(matches!(
            driver.execute().await,
            Err(DriverError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn signing_parties_in_tasks() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let keys = (1..=2).map(PartyKey::from).collect::<Vec<_>>();
        let (public_key, infos) = deal(1, &keys);
        let message_hash = hash_message(b"tasks");

        let mut inboxes = Vec::new();
        let mut parties = Vec::new();
        for (key, info) in keys.iter().zip(infos.iter()) {
            let params = Parameters::new(&keys, *key, 1)?;
            let (out_tx, out_rx) = futures::channel::mpsc::unbounded();
            let (end_tx, end_rx) = futures::channel::mpsc::unbounded();
            let (in_tx, in_rx) = futures::channel::mpsc::unbounded();
            let party = LocalParty::new(message_hash, params, info, out_tx, end_tx)?;
            inboxes.push((*party.params().own_id(), in_tx));
            parties.push((party, out_rx, end_rx, in_rx));
        }

        let mut handles = Vec::new();
        for (party, mut out_rx, mut end_rx, in_rx) in parties {
            let own = *party.params().own_id();
            let peers = inboxes
                .iter()
                .filter(|(id, _)| *id != own)
                .cloned()
                .collect::<Vec<_>>();
            tokio::spawn(async move {
                while let Some(msg) = out_rx.next().await {
                    for (peer, tx) in &peers {
                        let is_broadcast = msg.is_broadcast();
                        if is_broadcast || msg.recipient == Address::Peer(*peer) {
                            let _ = tx.unbounded_send(Instruction::Data(InMsg {
                                sender: own,
                                is_broadcast,
                                body: msg.body.clone(),
                            }));
                        }
                    }
                }
            });
            handles.push(tokio::spawn(async move {
                let mut driver = PartyDriver::new(party, in_rx, Some(Duration::from_secs(120)));
                let result = driver.execute().await;
                result.map(|_| end_rx.try_next())
            }));
        }

        for handle in handles {
            let signature = handle.await?;
            match signature {
                Ok(Ok(Some(data))) => assert!(data.signature.verify(&public_key, &message_hash)),
                other => panic!("no signature: {:?}", other),
            }
        }
        Ok(())
    }
}
