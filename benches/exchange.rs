use criterion::{criterion_group, criterion_main, Criterion};
use msidh::params::MsidhParameters;
use msidh::protocols::{DiffieHellman, KeyExchange, Party, Role};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use std::sync::Arc;

fn bench_toy_exchange(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(0xBE);
    let mut responder_rng = ChaCha20Rng::seed_from_u64(0xEF);
    let params = Arc::new(MsidhParameters::toy(&mut rng).expect("toy parameters"));

    c.bench_function("toy full exchange", |b| {
        b.iter(|| {
            let mut exchange = KeyExchange::new(
                Party::new(params.clone(), Role::Alice),
                Party::new(params.clone(), Role::Bob),
            );
            exchange
                .run(&mut rng, &mut responder_rng)
                .expect("exchange")
        })
    });

    let alice = Party::new(params.clone(), Role::Alice);
    let bob = Party::new(params.clone(), Role::Bob);
    let sk_b = bob.generate_private_key(&mut rng).expect("key");
    let pk_b = bob.derive_public_key(&sk_b).expect("public key");

    c.bench_function("toy public key verification", |b| {
        b.iter(|| alice.verify_peer_public_key(&pk_b, &mut rng).expect("verify"))
    });

    c.bench_function("toy parameter validation", |b| {
        b.iter(|| {
            let violations = params.validate(&mut rng);
            assert!(violations.is_empty());
        })
    });
}

criterion_group!(benches, bench_toy_exchange);
criterion_main!(benches);
