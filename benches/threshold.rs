//! Benchmarks for the authority ceremony and the tally path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num_bigint::BigInt;
use num_traits::Num;
use threshold_tally::functions::smallest_prime_from_power_of_two;
use threshold_tally::{
    accumulate, shamir, PaillierDecryptor, PrivateKey, PublicKey, ThresholdReconstructor,
};

const P_HEX: &str = "e042d32c3886b777d53c68db1d969e0eca8b43828b863916f3cb002680986de37513bda5dd0fc8a01053383ac7ec2c925457da22336da9d8c8764d7edb558807";
const Q_HEX: &str = "dd5600ca3d550f380c91c843ec327e9c820e815b8a28448ebb4e152c2f89a2adecb1488cd9cf7d3cfb5fdd8e9365339d41902d7745cbf51e9e1165c60e56ee13";

fn fixed_key() -> (PublicKey, PrivateKey) {
    let p = BigInt::from_str_radix(P_HEX, 16).unwrap();
    let q = BigInt::from_str_radix(Q_HEX, 16).unwrap();
    (PublicKey::new(&p * &q), PrivateKey::new(p, q))
}

fn bench_shares(c: &mut Criterion) {
    let (pk, sk) = fixed_key();
    let field = smallest_prime_from_power_of_two(sk.p.bits() + 128, 40, true);
    let shares = shamir::split(&sk.p, 5, 3, &field).unwrap();
    let phi = (&sk.p - 1u32) * (&sk.q - 1u32);
    let phi_field = smallest_prime_from_power_of_two(phi.bits() + 128, 40, true);
    let phi_shares = shamir::split(&phi, 5, 3, &phi_field).unwrap();
    let reconstructor = ThresholdReconstructor::default();

    let mut group = c.benchmark_group("shares");

    group.bench_function("split 3-of-5", |bencher| {
        bencher.iter(|| black_box(shamir::split(black_box(&sk.p), 5, 3, &field).unwrap()));
    });

    group.bench_function("reconstruct direct_p", |bencher| {
        bencher.iter(|| black_box(reconstructor.reconstruct(&shares[..3], 3, &pk.n).unwrap()));
    });

    group.bench_function("reconstruct old_phi_n", |bencher| {
        bencher.iter(|| {
            black_box(reconstructor.reconstruct(&phi_shares[..3], 3, &pk.n).unwrap())
        });
    });

    group.finish();
}

fn bench_tally(c: &mut Criterion) {
    let (pk, sk) = fixed_key();
    let ballots: Vec<BigInt> = (0..100)
        .map(|i| pk.encrypt(&BigInt::from(i % 2)).unwrap())
        .collect();
    let decryptor = PaillierDecryptor::new(&pk, &sk).unwrap();
    let total = accumulate(&pk, &ballots).combined;

    let mut group = c.benchmark_group("tally");

    group.bench_function("accumulate 100 ballots", |bencher| {
        bencher.iter(|| black_box(accumulate(&pk, black_box(&ballots))));
    });

    group.bench_function("decrypt total", |bencher| {
        bencher.iter(|| black_box(decryptor.decrypt(black_box(&total)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_shares, bench_tally);
criterion_main!(benches);
