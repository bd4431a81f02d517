//! Rounds of the signing protocol
//!
//! Each round object implements [`Round`]. The party calls `start` when the round becomes current,
//! feeds the store into `is_input_complete` after every stored message, and calls `consume` once the predicate holds.
//! `consume` returns [`Transition`] which is either the next round or the final signature.
//!
//! Rounds keep no state of their own: everything a round produces goes to [`ScratchData`](../scratch/struct.ScratchData.html).
#![allow(non_snake_case)]
use crate::ecdsa::keys::KeyShareView;
use crate::ecdsa::messages::{
    Message, OutMsg, Phase3data, Phase5Edata, SignBroadcastPhase1, SignDecommitPhase4,
    SignRound1Mta, SignRound2,
};
use crate::ecdsa::mta::{self, MessageA, MessageB};
use crate::ecdsa::signing::local_signature::LocalSignature;
use crate::ecdsa::signing::params::Parameters;
use crate::ecdsa::signing::scratch::{
    PeerCommitments, Round1Data, Round2Data, Round3Data, Round4Data, Round5Data, Round6Data,
    Round7Data, ScratchData,
};
use crate::ecdsa::signing::store::{MessageStore, Slots};
use crate::ecdsa::signing::{ErrorState, SignatureData, SigningError};
use crate::ecdsa::CommitmentScheme;
use crate::protocol::{Address, PartyId};
use curv::cryptographic_primitives::hashing::hash_sha256::HSha256;
use curv::cryptographic_primitives::hashing::traits::Hash;
use curv::cryptographic_primitives::proofs::sigma_correct_homomorphic_elgamal_enc::HomoElGamalStatement;
use curv::cryptographic_primitives::proofs::sigma_dlog::{DLogProof, ProveDLog};
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use std::fmt::{Debug, Error, Formatter};

/// What a round reads and writes
pub(crate) struct RoundContext<'a> {
    pub params: &'a Parameters,
    pub keys: &'a KeyShareView,
    pub store: &'a MessageStore,
    pub temp: &'a mut ScratchData,
}

pub(crate) enum Transition {
    NextRound(BoxedRound),
    Finished(SignatureData),
}

pub(crate) type BoxedRound = Box<dyn Round + Send>;

impl Debug for BoxedRound {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "Round{}", self.number())
    }
}

///   Round interface
pub(crate) trait Round {
    fn number(&self) -> u32;
    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState>;
    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool;
    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState>;
}

fn broadcast(body: Message) -> Vec<OutMsg> {
    vec![OutMsg {
        recipient: Address::Broadcast,
        body,
    }]
}

fn peer_msg<'a, T>(
    slots: &'a Slots<T>,
    party: &PartyId,
    kind: &'static str,
) -> Result<&'a T, SigningError> {
    slots.get(party.index).ok_or(SigningError::MissingMessage {
        party: *party,
        kind,
    })
}

fn check_errors(errors: Vec<SigningError>) -> Result<(), ErrorState> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ErrorState::new(errors))
    }
}

/// First round of the signing protocol
///
/// * Computes the additive share of the key $` w_{i} = \lambda_{i} x_{i} `$ and $` W_{j} `$ of other parties, see [`prepare`](#method.prepare)
/// * Samples  $` k_{i}, \space \gamma_{i}  \underset{R}{\in} Z_q `$
/// * Sends $` E_{i}(k_{i}) `$ to each peer and broadcasts the commitment to $` g^{\gamma_{i}} `$
/// * Checks that ciphertexts received from peers are well formed
pub(crate) struct Round1 {
    prepared: Option<(FE, Vec<GE>)>,
}

impl Round1 {
    pub fn new() -> Self {
        Round1 { prepared: None }
    }

    pub fn prepare(&mut self, ctx: &RoundContext<'_>) -> Result<(), ErrorState> {
        let w_i = ctx.keys.additive_share();
        let big_ws = ctx.keys.additive_public_shares();
        self.prepared = Some((w_i, big_ws));
        Ok(())
    }
}

impl Round for Round1 {
    fn number(&self) -> u32 {
        1
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 1 starts");
        let (w_i, big_ws) = self.prepared.take().ok_or_else(|| {
            SigningError::InternalInvariant("round 1 started before prepare".to_string())
        })?;

        let g: GE = ECPoint::generator();
        let k_i: FE = ECScalar::new_random();
        let gamma_i: FE = ECScalar::new_random();
        let g_gamma_i = g * gamma_i;
        let gamma_commitment = CommitmentScheme::from_GE(&g_gamma_i);

        let own_ek = &ctx.keys.own_he_keys.ek;
        let mut mta_requests = vec![None; ctx.params.party_count()];
        let mut output = Vec::new();
        for peer in ctx.params.peers() {
            let mta_a = MessageA::new(&k_i, own_ek);
            output.push(OutMsg {
                recipient: Address::Peer(*peer),
                body: Message::R1(SignRound1Mta {
                    mta_a: mta_a.clone(),
                }),
            });
            mta_requests[peer.index] = Some(mta_a);
        }
        output.push(OutMsg {
            recipient: Address::Broadcast,
            body: Message::R1b(SignBroadcastPhase1 {
                com: gamma_commitment.comm.clone(),
            }),
        });

        ctx.temp.set_round1(Round1Data {
            w_i,
            big_ws,
            k_i,
            gamma_i,
            g_gamma_i,
            gamma_commitment,
            mta_requests,
        })?;
        Ok(output)
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round1_mta.is_complete(own_index) && store.round1_commit.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let mut errors = Vec::new();
        let mut gamma_commitments = vec![None; ctx.params.party_count()];
        for peer in ctx.params.peers() {
            let request = peer_msg(&ctx.store.round1_mta, peer, "round 1 MtA")?;
            if !request.mta_a.is_well_formed(&ctx.keys.he_keys[peer.index]) {
                errors.push(SigningError::InvalidCiphertext { party: *peer });
            }
            let commit = peer_msg(&ctx.store.round1_commit, peer, "round 1 commitment")?;
            gamma_commitments[peer.index] = Some(commit.com.clone());
        }
        check_errors(errors)?;
        // round 4 opens these, whatever the peers send afterwards
        ctx.temp.set_peer_commitments(PeerCommitments { gamma_commitments })?;
        let r1 = ctx.temp.round1()?;
        log::debug!(
            "Round 1: {} MtA requests sent, peers' requests are well formed",
            r1.mta_requests.iter().flatten().count()
        );
        Ok(Transition::NextRound(Box::new(Round2)))
    }
}

/// Second round of the protocol
///
/// * Sends Bob's `MtA` message where $` \gamma_{i} `$ is shared, and Bob's `MtAwc` message where $` w_{i} `$ is shared, to each peer
/// * Verifies proofs of `MtA` responses received from peers
/// * Computes $` \delta_{i} = k_{i}\gamma_{i} + \sum_{j \not = i} \alpha_{ij} + \sum_{j \not = i} \beta_{ji} `$
///   and $` \sigma_{i} = k_{i}w_{i} + \sum_{j \not = i} \mu_{ij} + \sum_{j \not = i} \nu_{ji} `$
pub(crate) struct Round2;

impl Round for Round2 {
    fn number(&self) -> u32 {
        2
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 2 starts");
        let r1 = ctx.temp.round1()?;
        let n = ctx.params.party_count();
        let mut betas = vec![None; n];
        let mut nus = vec![None; n];
        let mut responses = vec![None; n];
        let mut output = Vec::new();

        for peer in ctx.params.peers() {
            let request = peer_msg(&ctx.store.round1_mta, peer, "round 1 MtA")?;
            let peer_ek = &ctx.keys.he_keys[peer.index];
            let (mta_gamma, beta) = MessageB::new(&r1.gamma_i, peer_ek, &request.mta_a);
            let (mta_w, nu) = MessageB::new(&r1.w_i, peer_ek, &request.mta_a);
            let response = SignRound2 { mta_gamma, mta_w };
            output.push(OutMsg {
                recipient: Address::Peer(*peer),
                body: Message::R2(response.clone()),
            });
            betas[peer.index] = Some(beta);
            nus[peer.index] = Some(nu);
            responses[peer.index] = Some(response);
        }

        ctx.temp.set_round2(Round2Data {
            betas,
            nus,
            responses,
        })?;
        Ok(output)
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round2.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let r1 = ctx.temp.round1()?;
        let r2 = ctx.temp.round2()?;
        let own_keys = &ctx.keys.own_he_keys;

        let mut errors = Vec::new();
        let mut delta_i = r1.k_i * r1.gamma_i;
        let mut sigma_i = r1.k_i * r1.w_i;
        let mut mta_gammas = vec![None; ctx.params.party_count()];
        for peer in ctx.params.peers() {
            let response = peer_msg(&ctx.store.round2, peer, "round 2")?;
            mta_gammas[peer.index] = Some(response.mta_gamma.proof.b_proof.pk);
            match mta::verify_proofs_get_alpha(peer, &response.mta_gamma, &r1.k_i, own_keys) {
                Ok(alpha) => delta_i = delta_i + alpha,
                Err(e) => errors.push(e),
            }
            match mta::verify_proofs_get_alpha_with_check(
                peer,
                &response.mta_w,
                &r1.k_i,
                own_keys,
                &r1.big_ws[peer.index],
            ) {
                Ok(mu) => sigma_i = sigma_i + mu,
                Err(e) => errors.push(e),
            }
        }
        check_errors(errors)?;
        log::debug!(
            "Round 2: {} MtA responses verified, {} sent",
            2 * ctx.params.peers().count(),
            r2.responses.iter().flatten().count() * 2
        );

        for beta in r2.betas.iter().flatten() {
            delta_i = delta_i + beta;
        }
        for nu in r2.nus.iter().flatten() {
            sigma_i = sigma_i + nu;
        }
        // k * gamma = sum(delta), k * w = sum(sigma) across the quorum

        ctx.temp.set_round3(Round3Data {
            delta_i,
            sigma_i,
            mta_gammas,
        })?;
        Ok(Transition::NextRound(Box::new(Round3)))
    }
}

/// Third round of the protocol
///
/// * Broadcasts  $` \delta_{i} `$
/// * Reconstructs $` \delta = \sum_{i \in S} \delta_{i} = k \gamma `$, where $`S`$ is the signing quorum, and inverts it
pub(crate) struct Round3;

impl Round for Round3 {
    fn number(&self) -> u32 {
        3
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 3 starts");
        let r3 = ctx.temp.round3()?;
        Ok(broadcast(Message::R3(Phase3data {
            delta_i: r3.delta_i,
        })))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round3.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let r3 = ctx.temp.round3()?;
        let mut delta = r3.delta_i.to_big_int();
        for peer in ctx.params.peers() {
            let msg = peer_msg(&ctx.store.round3, peer, "round 3")?;
            delta = delta + msg.delta_i.to_big_int();
        }
        let delta = delta.mod_floor(&FE::q());
        if delta == BigInt::zero() {
            return Err(SigningError::ZeroDelta.into());
        }
        let delta: FE = ECScalar::from(&delta);

        ctx.temp.set_round4(Round4Data {
            delta_inv: delta.invert(),
        })?;
        Ok(Transition::NextRound(Box::new(Round4)))
    }
}

/// Fourth round of the protocol
///
/// * Broadcasts $`  \Gamma_{i} = g^{\gamma_{i}} `$, the decommitment and ZKP of it
/// * Verifies the decommitment and ZKP of each other party, and that $` \Gamma_{j} `$ is the value the party used in `MtA`
/// * Reconstructs $` R = ( \prod_{i \in S} \Gamma_{i})^{\delta^{-1}} = g^{k^{-1}} `$ and $` r = H^{\prime}(R) `$
/// * Computes the partial signature $` s_{i} `$ and the commitment to $` V_{i}, A_{i}, B_{i} `$
pub(crate) struct Round4;

impl Round for Round4 {
    fn number(&self) -> u32 {
        4
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 4 starts");
        let r1 = ctx.temp.round1()?;
        Ok(broadcast(Message::R4(SignDecommitPhase4 {
            blind_factor: r1.gamma_commitment.decomm.clone(),
            g_gamma_i: r1.g_gamma_i,
            gamma_proof: DLogProof::prove(&r1.gamma_i),
        })))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round4.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let message_hash = ctx.temp.message_hash;
        let r1 = ctx.temp.round1()?;
        let r3 = ctx.temp.round3()?;
        let r4 = ctx.temp.round4()?;
        let commitments = ctx.temp.peer_commitments()?;

        let mut errors = Vec::new();
        let mut g_gamma_sum = r1.g_gamma_i;
        for peer in ctx.params.peers() {
            let decommit = peer_msg(&ctx.store.round4, peer, "round 4")?;
            let (comm, mta_gamma) = match (
                &commitments.gamma_commitments[peer.index],
                &r3.mta_gammas[peer.index],
            ) {
                (Some(comm), Some(mta_gamma)) => (comm, mta_gamma),
                _ => {
                    return Err(SigningError::InternalInvariant(format!(
                        "values of round 1 and 2 are missing for {}",
                        peer
                    ))
                    .into())
                }
            };

            let foreign_comm_scheme = CommitmentScheme {
                comm: comm.clone(),
                decomm: decommit.blind_factor.clone(),
            };
            if !foreign_comm_scheme.verify_commitment(decommit.g_gamma_i) {
                errors.push(SigningError::InvalidDecommitment {
                    party: *peer,
                    round: 4,
                });
                continue;
            }
            if DLogProof::verify(&decommit.gamma_proof).is_err()
                || decommit.gamma_proof.pk != decommit.g_gamma_i
            {
                errors.push(SigningError::DlogProofFailed { party: *peer });
                continue;
            }
            if *mta_gamma != decommit.g_gamma_i {
                errors.push(SigningError::InconsistentGamma { party: *peer });
                continue;
            }
            g_gamma_sum = g_gamma_sum + decommit.g_gamma_i;
        }
        check_errors(errors)?;

        let R = g_gamma_sum * r4.delta_inv;
        let local_sig = LocalSignature::new(&message_hash, &R, &r1.k_i, &r3.sigma_i)?;
        let (commitment, decommitment) = local_sig.phase5b_proof();

        ctx.temp.set_round5(Round5Data {
            local_sig,
            commitment,
            decommitment,
        })?;
        Ok(Transition::NextRound(Box::new(Round5)))
    }
}

/// Fifth round of the protocol, see (5A) in the paper
///
/// * Broadcasts the commitment to $` V_{i}, A_{i}, B_{i} `$
/// * Collects commitments of other parties
pub(crate) struct Round5;

impl Round for Round5 {
    fn number(&self) -> u32 {
        5
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 5 starts");
        let r5 = ctx.temp.round5()?;
        Ok(broadcast(Message::R5(r5.commitment.clone())))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round5.is_complete(own_index)
    }

    fn consume(&self, _ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        Ok(Transition::NextRound(Box::new(Round6)))
    }
}

/// Sixth round of the protocol, see (5B) in the paper
///
/// * Broadcasts the decommitment to $` V_{i}, A_{i}, B_{i} `$ and the proof of homomorphic ElGamal encryption
/// * Verifies decommitments and proofs of other parties
/// * Computes $` V = g^{-m} y^{-r} \prod_{i \in S} V_{i} `$ and $` A = \prod_{i \in S} A_{i} `$
pub(crate) struct Round6;

impl Round for Round6 {
    fn number(&self) -> u32 {
        6
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 6 starts");
        let r5 = ctx.temp.round5()?;
        Ok(broadcast(Message::R6(r5.decommitment.clone())))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round6.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let message_hash = ctx.temp.message_hash;
        let r5 = ctx.temp.round5()?;
        let g: GE = ECPoint::generator();

        let mut errors = Vec::new();
        let mut V = r5.decommitment.V_i;
        let mut A = r5.decommitment.A_i;
        for peer in ctx.params.peers() {
            let decommit = peer_msg(&ctx.store.round6, peer, "round 6")?;
            let commit = peer_msg(&ctx.store.round5, peer, "round 5")?;

            let input_hash =
                HSha256::create_hash_from_ge(&[&decommit.V_i, &decommit.A_i, &decommit.B_i])
                    .to_big_int();
            let scheme = CommitmentScheme {
                comm: commit.com.clone(),
                decomm: decommit.blind_factor.clone(),
            };
            if !scheme.verify_hash(&input_hash) {
                errors.push(SigningError::InvalidDecommitment {
                    party: *peer,
                    round: 6,
                });
                continue;
            }

            let statement = HomoElGamalStatement {
                G: decommit.A_i,
                H: r5.local_sig.R,
                Y: g,
                D: decommit.V_i,
                E: decommit.B_i,
            };
            if decommit.proof.verify(&statement).is_err() {
                errors.push(SigningError::InvalidElGamalProof { party: *peer });
                continue;
            }
            V = V + decommit.V_i;
            A = A + decommit.A_i;
        }
        check_errors(errors)?;

        let yr = ctx.keys.public_key * r5.local_sig.r;
        let gm = g * message_hash;
        let V = V.sub_point(&gm.get_element()).sub_point(&yr.get_element());

        ctx.temp.set_round6(Round6Data { V, A })?;
        Ok(Transition::NextRound(Box::new(Round7)))
    }
}

/// Seventh round of the protocol, see (5C) in the paper
///
/// * Computes $` U_{i} = V^{\rho_{i}} `$, $` T_{i} = A^{\ell_{i}} `$ and broadcasts the commitment to them
/// * Collects commitments of other parties
pub(crate) struct Round7;

impl Round for Round7 {
    fn number(&self) -> u32 {
        7
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 7 starts");
        let r5 = ctx.temp.round5()?;
        let r6 = ctx.temp.round6()?;
        let (commitment, decommitment) = r5.local_sig.phase5d_proof(r6.V, r6.A);
        ctx.temp.set_round7(Round7Data {
            commitment,
            decommitment,
        })?;
        let r7 = ctx.temp.round7()?;
        Ok(broadcast(Message::R7(r7.commitment.clone())))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round7.is_complete(own_index)
    }

    fn consume(&self, _ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        Ok(Transition::NextRound(Box::new(Round8)))
    }
}

/// Eighth round of the protocol, see (5D) in the paper
///
/// * Broadcasts the decommitment to $` U_{i}, T_{i} `$
/// * Verifies decommitments of other parties and checks that $` \prod_{i \in S} U_{i} = \prod_{i \in S} T_{i} `$
pub(crate) struct Round8;

impl Round for Round8 {
    fn number(&self) -> u32 {
        8
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 8 starts");
        let r7 = ctx.temp.round7()?;
        Ok(broadcast(Message::R8(r7.decommitment.clone())))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round8.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let r7 = ctx.temp.round7()?;

        let mut errors = Vec::new();
        let mut t_sum = r7.decommitment.T_i;
        let mut u_sum = r7.decommitment.U_i;
        for peer in ctx.params.peers() {
            let decommit = peer_msg(&ctx.store.round8, peer, "round 8")?;
            let commit = peer_msg(&ctx.store.round7, peer, "round 7")?;
            let input_hash =
                HSha256::create_hash_from_ge(&[&decommit.U_i, &decommit.T_i]).to_big_int();
            let scheme = CommitmentScheme {
                comm: commit.com.clone(),
                decomm: decommit.blind_factor.clone(),
            };
            if !scheme.verify_hash(&input_hash) {
                errors.push(SigningError::InvalidDecommitment {
                    party: *peer,
                    round: 8,
                });
                continue;
            }
            t_sum = t_sum + decommit.T_i;
            u_sum = u_sum + decommit.U_i;
        }
        check_errors(errors)?;

        let g: GE = ECPoint::generator();
        if g != (g + t_sum).sub_point(&u_sum.get_element()) {
            return Err(SigningError::ConsistencyCheckFailed.into());
        }
        Ok(Transition::NextRound(Box::new(Round9)))
    }
}

/// Ninth round of the protocol, see (5E) in the paper
///
/// * Broadcasts the partial signature $` s_{i} `$
/// * Reconstructs full signature and verifies it using standard method
pub(crate) struct Round9;

impl Round for Round9 {
    fn number(&self) -> u32 {
        9
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Result<Vec<OutMsg>, ErrorState> {
        log::debug!("Round 9 starts");
        let r5 = ctx.temp.round5()?;
        Ok(broadcast(Message::R9(Phase5Edata {
            s_i: r5.local_sig.s_i,
        })))
    }

    fn is_input_complete(&self, store: &MessageStore, own_index: usize) -> bool {
        store.round9.is_complete(own_index)
    }

    fn consume(&self, ctx: &mut RoundContext<'_>) -> Result<Transition, ErrorState> {
        let r5 = ctx.temp.round5()?;
        let s_vec = ctx
            .params
            .peers()
            .map(|peer| peer_msg(&ctx.store.round9, peer, "round 9").map(|m| m.s_i))
            .collect::<Result<Vec<_>, _>>()?;
        let signature =
            r5.local_sig
                .output_signature(&s_vec, &ctx.keys.public_key, &ctx.temp.message_hash)?;
        Ok(Transition::Finished(signature))
    }
}
