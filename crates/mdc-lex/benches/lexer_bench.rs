use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use mdc_lex::tokenize;
use mdc_util::Handler;

fn sample_program(repeats: usize) -> String {
    let unit = "Set `total` to _2_ + _3_ * _4_.\n\
                If `total` is greater than or equal to _10_ then:\n\
                > Say _\"big\"_.\n\
                give back `total`.\n";
    unit.repeat(repeats)
}

fn bench_lexer(c: &mut Criterion) {
    let small = sample_program(1);
    let large = sample_program(200);

    c.bench_function("lex_small", |b| {
        b.iter(|| {
            let handler = Handler::new();
            black_box(tokenize(black_box(&small), &handler))
        })
    });

    c.bench_function("lex_large", |b| {
        b.iter(|| {
            let handler = Handler::new();
            black_box(tokenize(black_box(&large), &handler))
        })
    });
}

criterion_group!(benches, bench_lexer);
criterion_main!(benches);
