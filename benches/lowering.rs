use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wasm2ir::{ir, lower_wasm, Options};

const FIB: &str = r#"
(module
  (memory 1)
  (global $calls (mut i32) (i32.const 0))
  (func $fib (param i32) (result i32)
    (global.set $calls (i32.add (global.get $calls) (i32.const 1)))
    (if (result i32) (i32.lt_s (local.get 0) (i32.const 2))
      (then (local.get 0))
      (else
        (i32.add
          (call $fib (i32.sub (local.get 0) (i32.const 1)))
          (call $fib (i32.sub (local.get 0) (i32.const 2)))))))
  (export "fib" (func $fib)))
"#;

fn lower(bytes: &[u8]) {
    let mut module = ir::Module::new();
    let lowered = lower_wasm(&mut module, Options::default(), bytes).unwrap();
    black_box((module, lowered));
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let fib = wat::parse_str(FIB).unwrap();

    let mut group = c.benchmark_group("Lower");
    group.bench_function("lower fib", |b| b.iter(|| lower(black_box(&fib))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
