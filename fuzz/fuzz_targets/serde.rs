#![no_main]

use cardinality_analytics::Sketch;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut sketch) = serde_json::from_slice::<Sketch>(data) {
        sketch.add(&1u64.to_le_bytes());
        assert!(sketch.estimate() > 0);
    }
});
