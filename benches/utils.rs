#![allow(dead_code, reason = "each bench uses a different subset")]

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

/// Generate n random profiles to render in the benchmark
pub fn generate_random_contexts(n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(42); // Fixed seed for reproducibility
    let mut contexts = Vec::with_capacity(n);

    for _ in 0..n {
        let name = random_string(&mut rng, 5, 10);
        let age = rng.random_range(18..80);
        let is_active = rng.random_bool(0.7);

        let items_count = rng.random_range(3..10);
        let mut items = Vec::with_capacity(items_count);
        for _ in 0..items_count {
            items.push(json!({
                "name": random_string(&mut rng, 3, 8),
                "value": rng.random_range(10..1000),
                "special": rng.random_bool(0.3)
            }));
        }

        contexts.push(json!({
            "user": {
                "name": name,
                "age": age,
                "active": is_active
            },
            "items": items,
            "show_details": rng.random_bool(0.8),
            "has_access": rng.random_bool(0.6),
        }));
    }

    contexts
}

/// Generate a random lowercase string with length between min and max
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let len = rng.random_range(min_len..=max_len);
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

// Print binary size information - can be used from individual benchmarks
pub fn print_binary_size() {
    let binary_path = std::env::current_exe().unwrap();
    let metadata = std::fs::metadata(&binary_path).unwrap();
    let size_bytes = metadata.len();
    let size_kb = size_bytes as f64 / 1024.0;
    let size_mb = size_kb / 1024.0;

    println!(
        "Binary size: {:.2} MB ({:.2} KB, {} bytes)",
        size_mb, size_kb, size_bytes
    );
    println!("Binary path: {}", binary_path.display());
}
