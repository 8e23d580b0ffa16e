use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cz_core::{Position, UcbVariant};
use cz_mcts::{Edge, Mcts, MctsConfig, NodeRef, RandomRollout, UniformPriors};

fn make_edges(n: usize) -> Vec<Edge<u16>> {
    // Representative priors and visit stats.
    (0..n)
        .map(|i| {
            let visits = (i as u32 * 7) % 17;
            Edge {
                action: i as u16,
                prior: 1.0 / n as f32,
                n: visits,
                w: (i as f32).sin() * visits as f32,
                parent: NodeRef::Dag(0),
                child: NodeRef::Dag(i as u32 + 1),
            }
        })
        .collect()
}

fn bench_select_edge(c: &mut Criterion) {
    let mut g = c.benchmark_group("cz_mcts_select_edge");
    for &n in &[20usize, 40, 218] {
        let edges = make_edges(n);
        for variant in [UcbVariant::AlphaZero, UcbVariant::Classic] {
            let id = BenchmarkId::new(format!("{variant:?}"), n);
            g.bench_with_input(id, &edges, |b, e| {
                b.iter(|| {
                    black_box(cz_mcts::select_edge(
                        black_box(e),
                        black_box(10_000),
                        black_box(1.5),
                        variant,
                        black_box(1.0),
                    ))
                })
            });
        }
    }
    g.finish();
}

fn bench_search(c: &mut Criterion) {
    let cfg = MctsConfig {
        max_trials: Some(128),
        ..MctsConfig::default()
    };
    c.bench_function("cz_mcts_search_startpos_128", |b| {
        b.iter(|| {
            let rollout = RandomRollout::new(0).with_max_plies(Some(60));
            let mut m = Mcts::new(cz_core::Chess, rollout, cfg).unwrap();
            let r = m
                .search(Position::startpos(), &UniformPriors, &[])
                .unwrap();
            black_box(r.root_visits)
        })
    });
}

criterion_group!(benches, bench_select_edge, bench_search);
criterion_main!(benches);
