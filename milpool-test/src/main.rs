mod autograd;
mod lifecycle;
mod reduce;

use milpool_core::{MilError, Scalar};
use rand::Rng;

fn assert_eq<T: Scalar>(x: impl IntoIterator<Item = T>, y: impl IntoIterator<Item = T>) {
    let x: Vec<T> = x.into_iter().collect();
    let y: Vec<T> = y.into_iter().collect();
    assert_eq!(x.len(), y.len());
    for (i, (ex, ey)) in x.into_iter().zip(y).enumerate() {
        if !ex.is_equal(ey) {
            panic!("Elements {ex:?} and {ey:?} at index {i} are not equal.");
        }
    }
}

/// Random layout, returns (bags, bag_size, classes)
fn random_layout(rng: &mut impl Rng) -> (usize, usize, usize) {
    (rng.gen_range(1..16), rng.gen_range(1..9), rng.gen_range(1..12))
}

/// Random scores from a small integer range, so that ties are common
fn random_scores<T: Scalar>(rng: &mut impl Rng, n: usize) -> Vec<T> {
    (0..n).map(|_| T::from_f64(rng.gen_range(-4..4) as f64)).collect()
}

fn run_test_fn<T: Scalar, F: Fn(T) -> Result<(), MilError>>(test_fn: F, x: T) {
    println!();
    let name = std::any::type_name::<F>();
    print!("Running test {name} with dtype {} ... ", T::dtype());
    let begin = std::time::Instant::now();
    let res = test_fn(x);
    let elapsed = begin.elapsed().as_nanos();
    res.unwrap_or_else(|err| panic!("Test {name} failed with error {err}"));
    print!("OK, time taken: {:.3} ms", elapsed as f32 / 1000000.);
}

macro_rules! run_test {
    ( $test:expr ) => {{
        run_test_fn($test, 0f32);
        run_test_fn($test, 0f64);
        run_test_fn($test, 0i32);
        run_test_fn($test, half::f16::ZERO);
        run_test_fn($test, half::bf16::ZERO);
    }};
}

fn main() {
    println!("\nTesting lifecycle");
    run_test!(lifecycle::stages);
    run_test!(lifecycle::unimplemented_methods);
    println!("\n\nTesting reduce");
    run_test!(reduce::grouped_max);
    run_test!(reduce::whole_batch_max);
    run_test!(reduce::label_mismatch);
    run_test!(reduce::deterministic);
    println!("\n\nTesting autograd");
    run_test!(autograd::scatter);
    run_test!(autograd::no_propagation);
    println!();
}
