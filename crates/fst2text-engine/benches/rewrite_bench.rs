// Rewriting throughput over a synthetic text.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use fst2text_core::Alphabet;
use fst2text_engine::{Automaton, Rewriter};

const LITERALS: &str = "\
0000000001
-1 main
: 0 1 1 1 2 1
t \n\
f
%cat/dog
%colour/color
%grey/gray
f
";

const META: &str = "\
0000000001
-1 main
: 0 1 1 1
t \n\
f
%<NB>/N
%<MOT>/W
f
";

fn bench_rewrite(c: &mut Criterion) {
    let alphabet = Alphabet::ascii();
    let text = "the grey cat saw 1 colour in 12 dreams and sat still. ".repeat(200);

    let literals = Automaton::parse(LITERALS).unwrap();
    let rewriter = Rewriter::new(&literals, &alphabet);
    c.bench_function("rewrite/literals", |b| {
        b.iter(|| rewriter.rewrite_str(black_box(&text)).unwrap())
    });

    let meta = Automaton::parse(META).unwrap();
    let rewriter = Rewriter::new(&meta, &alphabet);
    c.bench_function("rewrite/metacategories", |b| {
        b.iter(|| rewriter.rewrite_str(black_box(&text)).unwrap())
    });
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
