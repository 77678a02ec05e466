//! End-to-end exchange tests over the toy parameter set.

use msidh::errors::{ProtocolError, TorsionSide};
use msidh::params::MsidhParameters;
use msidh::protocols::{DiffieHellman, ExchangeState, KeyExchange, Party, PublicKey, Role};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use rug::Integer;
use std::sync::Arc;

/// Two parties over one toy parameter set, each with its own seeded RNG.
fn setup(seed: u64) -> (Party, Party, ChaCha20Rng, ChaCha20Rng) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let params = Arc::new(MsidhParameters::toy(&mut rng).expect("toy parameters"));
    let responder_rng = ChaCha20Rng::seed_from_u64(seed ^ 0x0DD5_EED5);
    (
        Party::new(params.clone(), Role::Alice),
        Party::new(params, Role::Bob),
        rng,
        responder_rng,
    )
}

#[test]
fn full_exchange_agrees_on_a_nontrivial_secret() {
    let (alice, bob, mut rng_a, mut rng_b) = setup(0xA11CE);
    let mut exchange = KeyExchange::new(alice, bob);
    let (secret_a, secret_b) = exchange.run(&mut rng_a, &mut rng_b).expect("exchange");
    assert_eq!(exchange.state(), ExchangeState::SecretDerived);
    assert_eq!(secret_a, secret_b);
    assert_eq!(secret_a.j_invariant(), secret_b.j_invariant());
    assert_ne!(secret_a.key_bytes(), &[0u8; 32]);
}

#[test]
fn repeated_runs_with_one_seed_pair_reproduce_the_secret() {
    let run = |seed: u64| {
        let (alice, bob, mut rng_a, mut rng_b) = setup(seed);
        let mut exchange = KeyExchange::new(alice, bob);
        exchange.run(&mut rng_a, &mut rng_b).expect("exchange").0
    };
    assert_eq!(run(0xB0B), run(0xB0B));
}

#[test]
fn different_seeds_usually_give_different_secrets() {
    // Not guaranteed in a toy group, but these particular seeds do differ.
    let run = |seed: u64| {
        let (alice, bob, mut rng_a, mut rng_b) = setup(seed);
        let mut exchange = KeyExchange::new(alice, bob);
        exchange.run(&mut rng_a, &mut rng_b).expect("exchange").0
    };
    let secrets: Vec<_> = [1u64, 2, 3, 4, 5].iter().map(|&s| run(s)).collect();
    assert!(secrets.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn tampering_with_either_public_key_aborts_verification() {
    let (alice, bob, mut rng_a, mut rng_b) = setup(0x7A17);
    let sk_a = alice.generate_private_key(&mut rng_a).expect("key");
    let sk_b = bob.generate_private_key(&mut rng_b).expect("key");
    let pk_a = alice.derive_public_key(&sk_a).expect("public key");
    let pk_b = bob.derive_public_key(&sk_b).expect("public key");

    // Doubling an image preserves its order but breaks the pairing relation.
    let two = Integer::from(2);
    let bad_b = PublicKey::new(
        pk_b.curve().clone(),
        pk_b.curve().scalar_mul(&two, pk_b.image_p()),
        pk_b.image_q().clone(),
    );
    match alice.verify_peer_public_key(&bad_b, &mut rng_a) {
        Err(ProtocolError::PairingMismatch {
            torsion: TorsionSide::A,
        }) => {}
        other => panic!("expected an A-torsion pairing mismatch, got {other:?}"),
    }

    let bad_a = PublicKey::new(
        pk_a.curve().clone(),
        pk_a.curve().scalar_mul(&two, pk_a.image_p()),
        pk_a.image_q().clone(),
    );
    match bob.verify_peer_public_key(&bad_a, &mut rng_b) {
        Err(ProtocolError::PairingMismatch {
            torsion: TorsionSide::B,
        }) => {}
        other => panic!("expected a B-torsion pairing mismatch, got {other:?}"),
    }

    // The honest keys still verify.
    alice
        .verify_peer_public_key(&pk_b, &mut rng_a)
        .expect("honest key");
    bob.verify_peer_public_key(&pk_a, &mut rng_b)
        .expect("honest key");
}

#[test]
fn parties_over_generated_parameters_also_agree() {
    let mut rng = ChaCha20Rng::seed_from_u64(0x6E4);
    let params = Arc::new(MsidhParameters::generate(2, 4, 1, &mut rng).expect("parameters"));
    let alice = Party::new(params.clone(), Role::Alice);
    let bob = Party::new(params, Role::Bob);
    let mut responder_rng = ChaCha20Rng::seed_from_u64(0x6E5);
    let mut exchange = KeyExchange::new(alice, bob);
    let (secret_a, secret_b) = exchange
        .run(&mut rng, &mut responder_rng)
        .expect("exchange");
    assert_eq!(secret_a, secret_b);
}
