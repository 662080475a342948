//! Benchmarks for launch planning
//!
//! Everything here runs before the wallet prompt, so it adds directly to the
//! latency a user sees after pressing mint:
//! - fee breakdown
//! - metadata sizing
//! - direct launch planning and order checks
//! - bundle compilation and wire encoding

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use launchpad::tx_builder::{
    base_mint_space, compute_fee_breakdown, compute_full_space, plan_direct_launch, sanity_check_launch_order,
    BundleRole, DirectLaunchParams, FeeSchedule, FeeTransfers, MintConfig, MintCreation, MintSpace,
    TransactionBundle,
};
use solana_sdk::{hash::Hash, pubkey::Pubkey};

fn params(config: MintConfig, referrer: bool, uri: &str) -> DirectLaunchParams {
    let payer = Pubkey::new_unique();
    let initial_space = base_mint_space().unwrap();
    let full_space = compute_full_space("Bench Token", "BNCH", uri).unwrap();
    DirectLaunchParams {
        fee_transfers: FeeTransfers {
            payer,
            fees: compute_fee_breakdown(&FeeSchedule::default(), &config, referrer),
            platform_wallet: Some(Pubkey::new_unique()),
            referrer: referrer.then(Pubkey::new_unique),
        },
        mint: MintCreation {
            mint: Pubkey::new_unique(),
            authority: payer,
            decimals: 9,
            name: "Bench Token".into(),
            symbol: "BNCH".into(),
            uri: uri.into(),
            space: MintSpace {
                initial_space,
                full_space,
                metadata_len: full_space - initial_space - 4,
                rent_lamports: (128 + full_space as u64) * 6_960,
            },
        },
        raw_supply: 1_000_000_000_000_000,
        config,
    }
}

fn bench_fees(c: &mut Criterion) {
    let schedule = FeeSchedule::default();
    let config = MintConfig {
        revoke_mint: true,
        revoke_freeze: true,
    };
    c.bench_function("fee_breakdown", |b| {
        b.iter(|| compute_fee_breakdown(black_box(&schedule), black_box(&config), black_box(true)))
    });
}

fn bench_sizing(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_space");
    for uri_len in [0usize, 64, 200] {
        let uri = "u".repeat(uri_len);
        group.bench_with_input(BenchmarkId::from_parameter(uri_len), &uri, |b, uri| {
            b.iter(|| compute_full_space(black_box("Bench Token"), black_box("BNCH"), black_box(uri)))
        });
    }
    group.finish();
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_direct_launch");
    for (label, config, referrer) in [
        ("minimal", MintConfig::default(), false),
        (
            "full",
            MintConfig {
                revoke_mint: true,
                revoke_freeze: true,
            },
            true,
        ),
    ] {
        let params = params(config, referrer, "ipfs://bafkbenchmarkmetadata");
        group.bench_with_input(BenchmarkId::from_parameter(label), &params, |b, params| {
            b.iter(|| plan_direct_launch(black_box(params)).unwrap())
        });
    }
    group.finish();

    let plan = plan_direct_launch(&params(MintConfig::default(), true, "")).unwrap();
    c.bench_function("sanity_check_launch_order", |b| {
        b.iter(|| sanity_check_launch_order(black_box(&plan.steps), true).unwrap())
    });
}

fn bench_bundle(c: &mut Criterion) {
    let params = params(
        MintConfig {
            revoke_mint: true,
            revoke_freeze: true,
        },
        true,
        "ipfs://bafkbenchmarkmetadata",
    );
    let plan = plan_direct_launch(&params).unwrap();
    let payer = params.fee_transfers.payer;
    let blockhash = Hash::new_unique();

    c.bench_function("compile_bundle", |b| {
        b.iter(|| {
            TransactionBundle::from_instructions(
                BundleRole::DirectMint,
                black_box(&plan.instructions),
                &payer,
                blockhash,
            )
        })
    });

    let bundle = TransactionBundle::from_instructions(BundleRole::DirectMint, &plan.instructions, &payer, blockhash);
    c.bench_function("bundle_to_base64", |b| b.iter(|| black_box(&bundle).to_base64().unwrap()));
}

criterion_group!(benches, bench_fees, bench_sizing, bench_planning, bench_bundle);
criterion_main!(benches);
