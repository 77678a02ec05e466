//! The masked supersingular-isogeny key exchange.
//!
//! Both parties run the same SIDH-style computation and differ only in which
//! torsion side they own. A party's public key consists of its codomain curve
//! and the images of the *peer's* torsion basis, scaled by a secret mask
//! whose square is 1 modulo the peer's degree. The mask hides the images
//! while leaving the Weil pairing relation
//! e(R, S) = e(P, Q)^degPeer intact, which is exactly what the receiver
//! checks before using a public key.

use crate::arithmetic::{modular, Fp2};
use crate::curves::{weil_pairing, Curve, Isogeny, Point};
use crate::errors::{ProtocolError, TorsionSide};
use crate::params::MsidhParameters;
use crate::protocols::masking::sample_masking_element;
use log::{debug, info, warn};
use rand_core::{CryptoRng, RngCore};
use rug::{Assign, Integer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Which torsion side a party controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Alice,
    Bob,
}

impl Role {
    pub fn torsion_side(self) -> TorsionSide {
        match self {
            Role::Alice => TorsionSide::A,
            Role::Bob => TorsionSide::B,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Alice => write!(f, "Alice"),
            Role::Bob => write!(f, "Bob"),
        }
    }
}

/// A party's secret material: the kernel scalar and the masking coefficient.
pub struct PrivateKey {
    scalar: Integer,
    mask: Integer,
}

impl PrivateKey {
    pub fn scalar(&self) -> &Integer {
        &self.scalar
    }

    pub fn mask(&self) -> &Integer {
        &self.mask
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(redacted)")
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        self.scalar.assign(0);
        self.mask.assign(0);
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// A party's public key: the codomain curve and the masked images of the
/// peer's torsion basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    curve: Curve,
    image_p: Point,
    image_q: Point,
}

impl PublicKey {
    /// Assemble a public key from received material. No validation happens
    /// here; run `verify_peer_public_key` before trusting it.
    pub fn new(curve: Curve, image_p: Point, image_q: Point) -> Self {
        Self {
            curve,
            image_p,
            image_q,
        }
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn image_p(&self) -> &Point {
        &self.image_p
    }

    pub fn image_q(&self) -> &Point {
        &self.image_q
    }
}

/// The agreed secret: the common j-invariant and a key derived from it.
#[derive(Debug, Clone)]
pub struct SharedSecret {
    j: Fp2,
    key: [u8; 32],
}

impl SharedSecret {
    fn from_j_invariant(j: Fp2) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"MSIDH shared secret v1");
        hasher.update(j.to_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { j, key }
    }

    pub fn j_invariant(&self) -> &Fp2 {
        &self.j
    }

    pub fn key_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Eq for SharedSecret {}

/// The operations one endpoint of an isogeny Diffie-Hellman exchange needs.
/// Randomness is threaded explicitly so callers can pin a deterministic RNG.
pub trait DiffieHellman {
    fn generate_private_key<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<PrivateKey, ProtocolError>;

    fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, ProtocolError>;

    fn verify_peer_public_key<R: RngCore + CryptoRng>(
        &self,
        peer_key: &PublicKey,
        rng: &mut R,
    ) -> Result<(), ProtocolError>;

    fn derive_shared_secret(
        &self,
        private_key: &PrivateKey,
        peer_key: &PublicKey,
    ) -> Result<SharedSecret, ProtocolError>;
}

/// One endpoint of the exchange, bound to a validated parameter set and a
/// role. Alice and Bob are the same type with the torsion sides swapped.
#[derive(Debug, Clone)]
pub struct Party {
    params: Arc<MsidhParameters>,
    role: Role,
}

impl Party {
    pub fn new(params: Arc<MsidhParameters>, role: Role) -> Self {
        Self { params, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn params(&self) -> &Arc<MsidhParameters> {
        &self.params
    }

    fn own_degree(&self) -> &Integer {
        match self.role {
            Role::Alice => self.params.degree_a(),
            Role::Bob => self.params.degree_b(),
        }
    }

    fn peer_degree(&self) -> &Integer {
        match self.role {
            Role::Alice => self.params.degree_b(),
            Role::Bob => self.params.degree_a(),
        }
    }

    fn own_basis(&self) -> (&Point, &Point) {
        match self.role {
            Role::Alice => self.params.basis_a(),
            Role::Bob => self.params.basis_b(),
        }
    }

    fn peer_basis(&self) -> (&Point, &Point) {
        match self.role {
            Role::Alice => self.params.basis_b(),
            Role::Bob => self.params.basis_a(),
        }
    }
}

impl DiffieHellman for Party {
    /// Sample a kernel scalar in [0, ownDegree) and a masking coefficient,
    /// a uniform square root of 1 modulo the peer's degree.
    fn generate_private_key<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<PrivateKey, ProtocolError> {
        let scalar = modular::random_below(self.own_degree(), rng);
        let mask = sample_masking_element(self.peer_degree(), rng)?;
        debug!("{}: private key generated", self.role);
        Ok(PrivateKey { scalar, mask })
    }

    /// Compute the isogeny with kernel P + [scalar]Q over the party's own
    /// basis, then publish the codomain together with the masked images of
    /// the peer's basis points.
    fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, ProtocolError> {
        let curve = self.params.curve();
        let (p_own, q_own) = self.own_basis();
        let (p_peer, q_peer) = self.peer_basis();

        let kernel = curve.add(p_own, &curve.scalar_mul(&private_key.scalar, q_own));
        let phi = Isogeny::from_kernel(curve, &kernel, self.own_degree())?;

        let codomain = phi.codomain().clone();
        let image_p = codomain.scalar_mul(&private_key.mask, &phi.evaluate(p_peer));
        let image_q = codomain.scalar_mul(&private_key.mask, &phi.evaluate(q_peer));
        debug!(
            "{}: public key derived, codomain j = {}",
            self.role,
            codomain.j_invariant()?
        );
        Ok(PublicKey {
            curve: codomain,
            image_p,
            image_q,
        })
    }

    /// Check a received public key before using it: the images must lie on
    /// the stated curve, be killed by this party's degree, and satisfy the
    /// pairing relation e(R, S) = e(P, Q)^degPeer, which the peer's mask
    /// cannot disturb because it squares to 1.
    fn verify_peer_public_key<R: RngCore + CryptoRng>(
        &self,
        peer_key: &PublicKey,
        rng: &mut R,
    ) -> Result<(), ProtocolError> {
        let side = self.role.torsion_side();
        let degree = self.own_degree();

        for image in [&peer_key.image_p, &peer_key.image_q] {
            if !peer_key.curve.contains(image) {
                warn!("{}: peer image off the stated curve", self.role);
                return Err(ProtocolError::PairingMismatch { torsion: side });
            }
            if !peer_key.curve.scalar_mul(degree, image).is_identity() {
                warn!("{}: peer image order does not divide {degree}", self.role);
                return Err(ProtocolError::PairingMismatch { torsion: side });
            }
        }

        let received = weil_pairing(
            &peer_key.curve,
            &peer_key.image_p,
            &peer_key.image_q,
            degree,
            rng,
        )?;
        let (p_own, q_own) = self.own_basis();
        let base = weil_pairing(self.params.curve(), p_own, q_own, degree, rng)?;
        let expected = base.pow(self.peer_degree())?;

        if received != expected {
            warn!("{}: pairing check failed on the {side}-torsion", self.role);
            return Err(ProtocolError::PairingMismatch { torsion: side });
        }
        debug!("{}: peer public key verified", self.role);
        Ok(())
    }

    /// Push the secret kernel through the peer's masked images. The mask is
    /// a unit modulo the image order, so it rescales the kernel generator
    /// without changing the subgroup, and both parties land on curves with
    /// the same j-invariant.
    fn derive_shared_secret(
        &self,
        private_key: &PrivateKey,
        peer_key: &PublicKey,
    ) -> Result<SharedSecret, ProtocolError> {
        let kernel = peer_key.curve.add(
            &peer_key.image_p,
            &peer_key.curve.scalar_mul(&private_key.scalar, &peer_key.image_q),
        );
        let phi = Isogeny::from_kernel(&peer_key.curve, &kernel, self.own_degree())?;
        let j = phi.codomain().j_invariant()?;
        info!("{}: shared secret derived", self.role);
        Ok(SharedSecret::from_j_invariant(j))
    }
}

/// Where a driven exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Init,
    ParamsAgreed,
    PrivateKeysGenerated,
    PublicKeysExchanged,
    Verified,
    SecretDerived,
    Aborted,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Init => "Init",
            ExchangeState::ParamsAgreed => "ParamsAgreed",
            ExchangeState::PrivateKeysGenerated => "PrivateKeysGenerated",
            ExchangeState::PublicKeysExchanged => "PublicKeysExchanged",
            ExchangeState::Verified => "Verified",
            ExchangeState::SecretDerived => "SecretDerived",
            ExchangeState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Drives a full exchange between two endpoints through the protocol state
/// machine. Generic over the endpoint implementation so alternative
/// isogeny-DH schemes can reuse the driver.
pub struct KeyExchange<P> {
    initiator: P,
    responder: P,
    state: ExchangeState,
}

impl<P: DiffieHellman> KeyExchange<P> {
    pub fn new(initiator: P, responder: P) -> Self {
        Self {
            initiator,
            responder,
            state: ExchangeState::Init,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Run the whole exchange. Each endpoint draws exclusively from its own
    /// RNG; the two parties share no randomness state. Any failure aborts
    /// the run and leaves the state machine in `Aborted`.
    pub fn run<R: RngCore + CryptoRng>(
        &mut self,
        initiator_rng: &mut R,
        responder_rng: &mut R,
    ) -> Result<(SharedSecret, SharedSecret), ProtocolError> {
        let outcome = self.advance(initiator_rng, responder_rng);
        if let Err(error) = &outcome {
            warn!("exchange aborted in state {}: {error}", self.state);
            self.state = ExchangeState::Aborted;
        }
        outcome
    }

    fn advance<R: RngCore + CryptoRng>(
        &mut self,
        initiator_rng: &mut R,
        responder_rng: &mut R,
    ) -> Result<(SharedSecret, SharedSecret), ProtocolError> {
        self.transition(ExchangeState::ParamsAgreed);

        let initiator_key = self.initiator.generate_private_key(initiator_rng)?;
        let responder_key = self.responder.generate_private_key(responder_rng)?;
        self.transition(ExchangeState::PrivateKeysGenerated);

        let initiator_public = self.initiator.derive_public_key(&initiator_key)?;
        let responder_public = self.responder.derive_public_key(&responder_key)?;
        self.transition(ExchangeState::PublicKeysExchanged);

        self.initiator
            .verify_peer_public_key(&responder_public, initiator_rng)?;
        self.responder
            .verify_peer_public_key(&initiator_public, responder_rng)?;
        self.transition(ExchangeState::Verified);

        let initiator_secret = self
            .initiator
            .derive_shared_secret(&initiator_key, &responder_public)?;
        let responder_secret = self
            .responder
            .derive_shared_secret(&responder_key, &initiator_public)?;
        self.transition(ExchangeState::SecretDerived);

        Ok((initiator_secret, responder_secret))
    }

    fn transition(&mut self, next: ExchangeState) {
        debug!("exchange state: {} -> {next}", self.state);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn toy_parties(seed: u64) -> (Party, Party, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let params = Arc::new(MsidhParameters::toy(&mut rng).unwrap());
        let alice = Party::new(params.clone(), Role::Alice);
        let bob = Party::new(params, Role::Bob);
        (alice, bob, rng)
    }

    #[test]
    fn masks_square_to_one_modulo_the_peer_degree() {
        let (alice, bob, mut rng) = toy_parties(1);
        for _ in 0..10 {
            let sk_a = alice.generate_private_key(&mut rng).unwrap();
            let sk_b = bob.generate_private_key(&mut rng).unwrap();
            assert_eq!(sk_a.mask().clone().square() % bob.own_degree(), 1);
            assert_eq!(sk_b.mask().clone().square() % alice.own_degree(), 1);
            assert!(*sk_a.scalar() < *alice.own_degree());
            assert!(*sk_b.scalar() < *bob.own_degree());
        }
    }

    #[test]
    fn public_keys_pass_verification() {
        let (alice, bob, mut rng) = toy_parties(2);
        let sk_a = alice.generate_private_key(&mut rng).unwrap();
        let sk_b = bob.generate_private_key(&mut rng).unwrap();
        let pk_a = alice.derive_public_key(&sk_a).unwrap();
        let pk_b = bob.derive_public_key(&sk_b).unwrap();
        alice.verify_peer_public_key(&pk_b, &mut rng).unwrap();
        bob.verify_peer_public_key(&pk_a, &mut rng).unwrap();
    }

    #[test]
    fn both_parties_agree_on_the_secret() {
        for seed in [3u64, 4, 5] {
            let (alice, bob, mut rng) = toy_parties(seed);
            let sk_a = alice.generate_private_key(&mut rng).unwrap();
            let sk_b = bob.generate_private_key(&mut rng).unwrap();
            let pk_a = alice.derive_public_key(&sk_a).unwrap();
            let pk_b = bob.derive_public_key(&sk_b).unwrap();
            let secret_a = alice.derive_shared_secret(&sk_a, &pk_b).unwrap();
            let secret_b = bob.derive_shared_secret(&sk_b, &pk_a).unwrap();
            assert_eq!(secret_a, secret_b);
            assert_eq!(secret_a.j_invariant(), secret_b.j_invariant());
        }
    }

    #[test]
    fn tampered_public_key_is_rejected() {
        let (alice, bob, mut rng) = toy_parties(6);
        let sk_b = bob.generate_private_key(&mut rng).unwrap();
        let mut pk_b = bob.derive_public_key(&sk_b).unwrap();

        // Doubling one image keeps its order (gcd(2, 15) = 1) but breaks
        // the pairing relation.
        pk_b.image_p = pk_b.curve.scalar_mul(&Integer::from(2), &pk_b.image_p);
        let err = alice.verify_peer_public_key(&pk_b, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PairingMismatch {
                torsion: TorsionSide::A
            }
        ));
    }

    #[test]
    fn image_of_wrong_order_is_rejected() {
        let (alice, bob, mut rng) = toy_parties(7);
        let sk_a = alice.generate_private_key(&mut rng).unwrap();
        let sk_b = bob.generate_private_key(&mut rng).unwrap();
        let pk_a = alice.derive_public_key(&sk_a).unwrap();
        let mut pk_b = bob.derive_public_key(&sk_b).unwrap();

        // Swap in a point of B-order from Alice's key: not killed by A = 15.
        pk_b.image_q = pk_a.image_p.clone();
        assert!(alice.verify_peer_public_key(&pk_b, &mut rng).is_err());
    }

    #[test]
    fn exchange_driver_reaches_secret_derived() {
        let (alice, bob, mut rng) = toy_parties(8);
        let mut responder_rng = ChaCha20Rng::seed_from_u64(88);
        let mut exchange = KeyExchange::new(alice, bob);
        assert_eq!(exchange.state(), ExchangeState::Init);
        let (secret_a, secret_b) = exchange.run(&mut rng, &mut responder_rng).unwrap();
        assert_eq!(exchange.state(), ExchangeState::SecretDerived);
        assert_eq!(secret_a, secret_b);
    }

    #[test]
    fn endpoint_randomness_streams_are_independent() {
        let (alice, bob, _) = toy_parties(12);

        // Alice's draws must not depend on how much the responder consumes
        // from its own stream, in either interleaving.
        let mut rng_a = ChaCha20Rng::seed_from_u64(21);
        let sk_first = alice.generate_private_key(&mut rng_a).unwrap();

        let mut rng_a = ChaCha20Rng::seed_from_u64(21);
        let mut rng_b = ChaCha20Rng::seed_from_u64(22);
        for _ in 0..5 {
            let _ = bob.generate_private_key(&mut rng_b).unwrap();
        }
        let sk_second = alice.generate_private_key(&mut rng_a).unwrap();

        assert_eq!(sk_first.scalar(), sk_second.scalar());
        assert_eq!(sk_first.mask(), sk_second.mask());
    }

    #[test]
    fn exchange_is_deterministic_under_a_fixed_seed() {
        let run = |seed: u64| {
            let (alice, bob, mut rng) = toy_parties(seed);
            let sk_a = alice.generate_private_key(&mut rng).unwrap();
            let sk_b = bob.generate_private_key(&mut rng).unwrap();
            let pk_a = alice.derive_public_key(&sk_a).unwrap();
            let pk_b = bob.derive_public_key(&sk_b).unwrap();
            let secret = alice.derive_shared_secret(&sk_a, &pk_b).unwrap();
            (pk_a, pk_b, secret)
        };
        let (pk_a1, pk_b1, s1) = run(99);
        let (pk_a2, pk_b2, s2) = run(99);
        assert_eq!(pk_a1, pk_a2);
        assert_eq!(pk_b1, pk_b2);
        assert_eq!(s1, s2);
    }

    #[test]
    fn shared_secret_key_is_bound_to_the_j_invariant() {
        let (alice, bob, mut rng) = toy_parties(10);
        let sk_a = alice.generate_private_key(&mut rng).unwrap();
        let sk_b = bob.generate_private_key(&mut rng).unwrap();
        let pk_a = alice.derive_public_key(&sk_a).unwrap();
        let pk_b = bob.derive_public_key(&sk_b).unwrap();
        let secret_a = alice.derive_shared_secret(&sk_a, &pk_b).unwrap();
        let secret_b = bob.derive_shared_secret(&sk_b, &pk_a).unwrap();
        assert_eq!(secret_a.key_bytes(), secret_b.key_bytes());
        assert_eq!(secret_a.key_bytes().len(), 32);
    }

    #[test]
    fn private_key_zeroizes() {
        let (alice, _, mut rng) = toy_parties(11);
        let mut sk = alice.generate_private_key(&mut rng).unwrap();
        sk.zeroize();
        assert_eq!(*sk.scalar(), 0);
        assert_eq!(*sk.mask(), 0);
    }
}
