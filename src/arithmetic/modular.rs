//! Modular number theory used by parameter generation and masking.
//!
//! The integers handled here are either searched cofactors or products of
//! small primes, so trial-division factorization is adequate; nothing in the
//! protocol factors an adversarial integer.

use rand_core::{CryptoRng, RngCore};
use rug::integer::IsPrime;
use rug::ops::{Pow, RemRounding};
use rug::Integer;

/// Miller-Rabin rounds for [`is_prime`]. 25 rounds keeps the error
/// probability below 2⁻⁵⁰, which rug treats as definitive for this size.
const MILLER_RABIN_ROUNDS: u32 = 25;

/// Probabilistic primality test.
pub fn is_prime(n: &Integer) -> bool {
    n.is_probably_prime(MILLER_RABIN_ROUNDS) != IsPrime::No
}

/// Trial-division factorization into (prime, exponent) pairs, ascending.
///
/// Intended for smooth inputs (torsion degrees, cofactors, p + 1); cost is
/// proportional to the largest prime factor.
pub fn factorize(n: &Integer) -> Vec<(Integer, u32)> {
    let mut remaining = n.clone();
    let mut factors = Vec::new();
    let mut divisor = Integer::from(2);
    while Integer::from(&divisor * &divisor) <= remaining {
        let mut exponent = 0u32;
        while remaining.is_divisible(&divisor) {
            remaining /= &divisor;
            exponent += 1;
        }
        if exponent > 0 {
            factors.push((divisor.clone(), exponent));
        }
        divisor += 1;
    }
    if remaining > 1 {
        factors.push((remaining, 1));
    }
    factors
}

/// Local square roots of 1 modulo ℓ^e.
///
/// Odd prime powers contribute ±1; powers of two contribute one, two or four
/// roots depending on the 2-adic valuation.
fn local_unit_roots(prime: &Integer, exponent: u32) -> Vec<Integer> {
    let modulus = Integer::from(prime.pow(exponent));
    if *prime == 2 {
        match exponent {
            1 => vec![Integer::from(1)],
            2 => vec![Integer::from(1), Integer::from(3)],
            _ => {
                let half = Integer::from(&modulus / 2u32);
                vec![
                    Integer::from(1),
                    Integer::from(&half - 1u32),
                    Integer::from(&half + 1u32),
                    Integer::from(&modulus - 1u32),
                ]
            }
        }
    } else {
        vec![Integer::from(1), Integer::from(&modulus - 1u32)]
    }
}

/// CRT data for one prime-power factor of the modulus.
struct CrtSlot {
    roots: Vec<Integer>,
    /// M_i * (M_i⁻¹ mod q_i), the CRT basis element for this slot.
    basis: Integer,
}

fn crt_slots(modulus: &Integer) -> Vec<CrtSlot> {
    factorize(modulus)
        .into_iter()
        .map(|(prime, exponent)| {
            let q = Integer::from(prime.clone().pow(exponent));
            let cofactor = Integer::from(modulus / &q);
            let inverse = cofactor
                .clone()
                .invert(&q)
                .expect("prime-power factors are pairwise coprime");
            CrtSlot {
                roots: local_unit_roots(&prime, exponent),
                basis: Integer::from(&cofactor * &inverse),
            }
        })
        .collect()
}

/// Enumerate all x in Z/n with x² ≡ 1 (mod n), sorted ascending.
///
/// The count is the product of the per-factor root counts, so this is only
/// tractable for moduli with few prime factors; uniform sampling at scale
/// goes through [`sample_unit_root`] instead.
pub fn unit_square_roots(modulus: &Integer) -> Vec<Integer> {
    assert!(*modulus >= 2, "modulus must be at least 2");
    let slots = crt_slots(modulus);
    let mut roots = vec![Integer::new()];
    for slot in &slots {
        let mut next = Vec::with_capacity(roots.len() * slot.roots.len());
        for partial in &roots {
            for local in &slot.roots {
                let term = Integer::from(local * &slot.basis);
                next.push(Integer::from(partial + &term).rem_euc(modulus));
            }
        }
        roots = next;
    }
    roots.sort();
    roots.dedup();
    roots
}

/// Draw one square root of 1 modulo n, uniformly over all of them.
///
/// One local root is chosen uniformly per prime-power factor and the choices
/// are CRT-combined; by the Chinese Remainder Theorem this is exactly the
/// uniform distribution over the full root set, without enumerating it.
pub fn sample_unit_root<R: RngCore + CryptoRng>(modulus: &Integer, rng: &mut R) -> Integer {
    assert!(*modulus >= 2, "modulus must be at least 2");
    let slots = crt_slots(modulus);
    let mut combined = Integer::new();
    for slot in &slots {
        let index = (rng.next_u64() % slot.roots.len() as u64) as usize;
        let term = Integer::from(&slot.roots[index] * &slot.basis);
        combined += term;
    }
    combined.rem_euc(modulus)
}

/// Uniform random integer in `[0, bound)` via rejection sampling.
pub fn random_below<R: RngCore + CryptoRng>(bound: &Integer, rng: &mut R) -> Integer {
    assert!(*bound >= 1, "bound must be positive");
    if *bound == 1 {
        return Integer::new();
    }
    let bits = bound.significant_bits();
    let bytes = bits.div_ceil(8) as usize;
    let mut buf = vec![0u8; bytes];
    loop {
        rng.fill_bytes(&mut buf);
        let mut candidate = Integer::from_digits(&buf, rug::integer::Order::MsfBe);
        candidate.keep_bits_mut(bits);
        if candidate < *bound {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn primality_on_known_values() {
        assert!(is_prime(&Integer::from(2)));
        assert!(is_prime(&Integer::from(9239)));
        assert!(is_prime(&Integer::from(2309)));
        assert!(!is_prime(&Integer::from(1)));
        assert!(!is_prime(&Integer::from(4619))); // 31 * 149
        assert!(!is_prime(&Integer::from(9240)));
    }

    #[test]
    fn factorization_of_group_exponent() {
        // 9240 = 2^3 * 3 * 5 * 7 * 11, the toy p + 1.
        let factors = factorize(&Integer::from(9240));
        let expected = vec![
            (Integer::from(2), 3),
            (Integer::from(3), 1),
            (Integer::from(5), 1),
            (Integer::from(7), 1),
            (Integer::from(11), 1),
        ];
        assert_eq!(factors, expected);
    }

    #[test]
    fn unit_roots_of_toy_degrees() {
        let mod15: Vec<_> = unit_square_roots(&Integer::from(15));
        assert_eq!(mod15, vec![1, 4, 11, 14].into_iter().map(Integer::from).collect::<Vec<_>>());

        let mod77: Vec<_> = unit_square_roots(&Integer::from(77));
        assert_eq!(mod77, vec![1, 34, 43, 76].into_iter().map(Integer::from).collect::<Vec<_>>());

        // Powers of two hit the 4-root case.
        let mod8: Vec<_> = unit_square_roots(&Integer::from(8));
        assert_eq!(mod8, vec![1, 3, 5, 7].into_iter().map(Integer::from).collect::<Vec<_>>());

        let mod2: Vec<_> = unit_square_roots(&Integer::from(2));
        assert_eq!(mod2, vec![Integer::from(1)]);
    }

    #[test]
    fn every_enumerated_root_squares_to_one() {
        for n in [15u32, 77, 8, 12, 60, 105, 128] {
            let modulus = Integer::from(n);
            for root in unit_square_roots(&modulus) {
                let sq = Integer::from(&root * &root).rem_euc(&modulus);
                assert_eq!(sq, 1, "root {root} mod {n}");
            }
        }
    }

    #[test]
    fn sampled_roots_are_roots_and_cover_the_set() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let modulus = Integer::from(77);
        let all = unit_square_roots(&modulus);
        let mut seen = std::collections::HashMap::new();
        for _ in 0..400 {
            let root = sample_unit_root(&modulus, &mut rng);
            let sq = Integer::from(&root * &root).rem_euc(&modulus);
            assert_eq!(sq, 1);
            *seen.entry(root).or_insert(0usize) += 1;
        }
        // All four roots appear, each a reasonable share of 400 draws.
        assert_eq!(seen.len(), all.len());
        for (_, count) in seen {
            assert!(count > 40, "sampling looks biased: {count}/400");
        }
    }

    #[test]
    fn random_below_stays_in_range_and_is_deterministic() {
        let bound = Integer::from(15);
        let mut rng1 = ChaCha20Rng::seed_from_u64(42);
        let mut rng2 = ChaCha20Rng::seed_from_u64(42);
        for _ in 0..100 {
            let a = random_below(&bound, &mut rng1);
            let b = random_below(&bound, &mut rng2);
            assert!(a < bound);
            assert_eq!(a, b);
        }
    }
}
