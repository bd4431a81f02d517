//! The partial signature used by rounds 4 to 9 of the protocol
#![allow(non_snake_case)]
use crate::ecdsa::messages::{Phase5Com1, Phase5Com2, Phase5Decom1, Phase5Decom2};
use crate::ecdsa::signing::{SignatureData, SigningError};
use crate::ecdsa::{recovery_id, x_coordinate_mod_q, CommitmentScheme, MessageHashType, Signature};
use curv::cryptographic_primitives::hashing::hash_sha256::HSha256;
use curv::cryptographic_primitives::hashing::traits::Hash;
use curv::cryptographic_primitives::proofs::sigma_correct_homomorphic_elgamal_enc::{
    HomoELGamalProof, HomoElGamalStatement, HomoElGamalWitness,
};
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{FE, GE};
use trace::trace;
use zeroize::Zeroize;

/// Represents the partial signature used by multiple sub-phases of phase 5 of the protocol
#[derive(Clone, Debug)]
pub(crate) struct LocalSignature {
    pub l_i: FE,
    pub rho_i: FE,
    pub R: GE,
    pub r: FE,
    pub s_i: FE,
}

#[trace(pretty, prefix = "LocalSignature::")]
impl LocalSignature {
    /// Initializes the data with $` R, \space k_{i}, \space \sigma_{i} `$ .
    /// Sets (t,t) sharing of the desired signature to $` s_{i} = m k_{i} + r \sigma_{i} `$.
    /// Chooses  $` \ell_{i}, \space \rho_{i}  \underset{R}{\in} Z_q `$
    pub fn new(
        message_hash: &MessageHashType,
        R: &GE,
        k_i: &FE,
        sigma_i: &FE,
    ) -> Result<Self, SigningError> {
        // H'(R) = Rx mod q
        let r = x_coordinate_mod_q(R).ok_or(SigningError::DegenerateNonce)?;
        let s_i = (*message_hash) * k_i + r * sigma_i; // <- partial signature
        let l_i: FE = ECScalar::new_random();
        let rho_i: FE = ECScalar::new_random();
        Ok(Self {
            l_i,
            rho_i,
            R: *R,
            r,
            s_i,
        })
    }

    /// generates (Comm,Decomm) for $` V_{i} , \space A_{i}, \space B_{i} `$
    pub fn phase5b_proof(&self) -> (Phase5Com1, Phase5Decom1) {
        let g: GE = ECPoint::generator();
        let A_i = g * self.rho_i;
        let l_i_rho_i = self.l_i.mul(&self.rho_i.get_element());
        let V_i = self.R * self.s_i + g * self.l_i;
        let B_i = g * l_i_rho_i;
        let input_hash = HSha256::create_hash_from_ge(&[&V_i, &A_i, &B_i]).to_big_int();
        let commitment_scheme = CommitmentScheme::from_BigInt(&input_hash);

        let witness = HomoElGamalWitness {
            r: self.l_i,
            x: self.s_i,
        };
        let delta = HomoElGamalStatement {
            G: A_i,
            H: self.R,
            Y: g,
            D: V_i,
            E: B_i,
        };
        let proof = HomoELGamalProof::prove(&witness, &delta);
        (
            Phase5Com1 {
                com: commitment_scheme.comm,
            },
            Phase5Decom1 {
                V_i,
                A_i,
                B_i,
                blind_factor: commitment_scheme.decomm,
                proof,
            },
        )
    }

    /// generates (Comm, Decomm) for $` U_{i}, \space T_{i} `$
    pub fn phase5d_proof(&self, v: GE, a: GE) -> (Phase5Com2, Phase5Decom2) {
        let u_i = v * self.rho_i;
        let t_i = a * self.l_i;
        let input_hash = HSha256::create_hash_from_ge(&[&u_i, &t_i]).to_big_int();
        let scheme = CommitmentScheme::from_BigInt(&input_hash);
        (
            Phase5Com2 { com: scheme.comm },
            Phase5Decom2 {
                U_i: u_i,
                T_i: t_i,
                blind_factor: scheme.decomm,
            },
        )
    }

    /// calculates final signature as the sum of partial signatures, and verifies it using standard verification schema
    ///
    /// The returned signature has low `s` and the recovery id which matches it.
    pub fn output_signature(
        &self,
        s_vec: &[FE],
        pubkey: &GE,
        message: &MessageHashType,
    ) -> Result<SignatureData, SigningError> {
        let s = s_vec.iter().fold(self.s_i, |acc, x| acc + x);
        let mut signature = Signature { r: self.r, s };
        if !signature.verify(pubkey, message) {
            return Err(SigningError::SignatureVerificationFailed);
        }
        let mut recovery_id = recovery_id(&self.R).ok_or(SigningError::DegenerateNonce)?;
        if signature.normalize_s() {
            recovery_id ^= 1;
        }
        Ok(SignatureData {
            signature,
            recovery_id,
            message_hash: *message,
        })
    }
}

impl Drop for LocalSignature {
    fn drop(&mut self) {
        self.l_i.zeroize();
        self.rho_i.zeroize();
        self.s_i.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::LocalSignature;
    use crate::ecdsa::hash_message;
    use crate::ecdsa::tests::recover_public_key;
    use curv::elliptic::curves::traits::{ECPoint, ECScalar};
    use curv::{FE, GE};

    // a single party holding the whole key: sigma = k * x
    #[test]
    fn single_share_signature() -> anyhow::Result<()> {
        let g: GE = ECPoint::generator();
        let x: FE = ECScalar::new_random();
        let k: FE = ECScalar::new_random();
        let m = hash_message(b"local signature");

        let big_r = g * k.invert();
        let local = LocalSignature::new(&m, &big_r, &k, &(k * x))?;
        let data = local.output_signature(&[], &(g * x), &m)?;
        assert!(data.signature.verify(&(g * x), &m));
        assert!(!data.signature.is_high_s());
        assert_eq!(data.message_hash, m);
        assert_eq!(
            recover_public_key(&data.signature, data.recovery_id, &m),
            Some(g * x)
        );

        assert!(local.output_signature(&[], &GE::random_point(), &m).is_err());
        Ok(())
    }
}
