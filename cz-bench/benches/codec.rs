use std::str::FromStr;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chess::ChessMove;
use cz_core::{move_from_policy_index, move_to_policy_index, Position};

const FENS: &[&str] = &[
    cz_core::START_FEN,
    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2P5/8/3N4/8/8/1p6/4K2k w - - 0 1",
];

fn positions() -> Vec<(Position, Vec<ChessMove>)> {
    FENS.iter()
        .map(|fen| {
            let p = Position::from_str(fen).unwrap();
            let moves = p.legal_moves();
            (p, moves)
        })
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let mut g = c.benchmark_group("cz_core_codec");
    for (i, (position, moves)) in positions().iter().enumerate() {
        g.bench_with_input(BenchmarkId::new("encode_legal", i), moves, |b, ms| {
            b.iter(|| {
                for &mv in ms {
                    black_box(move_to_policy_index(black_box(mv)).unwrap());
                }
            })
        });
        let indices: Vec<usize> = moves
            .iter()
            .map(|&mv| move_to_policy_index(mv).unwrap())
            .collect();
        g.bench_with_input(BenchmarkId::new("decode_legal", i), &indices, |b, idx| {
            b.iter(|| {
                for &flat in idx {
                    black_box(move_from_policy_index(position, black_box(flat)).unwrap());
                }
            })
        });
    }
    g.finish();
}

fn bench_legal_mask(c: &mut Criterion) {
    let ps = positions();
    c.bench_function("cz_core_legal_policy_mask", |b| {
        b.iter(|| {
            for (p, _) in &ps {
                black_box(cz_core::legal_policy_mask(black_box(p)).unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_codec, bench_legal_mask);
criterion_main!(benches);
