#![no_main]

use cardinality_analytics::Sketch;
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let precision = 4 + data[0] % 13;
    let data = &data[1..];
    let split_index = wyhash(data, 0) as usize % data.len().max(1);
    let (first_half, second_half) = data.split_at(split_index.min(data.len()));

    let mut sketch1 = Sketch::new(precision).unwrap();
    for chunk in first_half.chunks(4) {
        sketch1.add(chunk);
        assert!(sketch1.estimate() > 0);
    }

    let mut sketch2 = Sketch::new(precision).unwrap();
    for chunk in second_half.chunks(4) {
        sketch2.add(chunk);
        assert!(sketch2.estimate() > 0);
    }

    sketch1.merge(&sketch2).unwrap();
    assert_eq!(sketch1.is_empty(), data.is_empty());

    // arbitrary bytes are either rejected or decode to a usable sketch
    if let Ok(decoded) = Sketch::from_bytes(precision, data) {
        assert_eq!(decoded.to_bytes(), data);
        let _ = decoded.estimate();
    }
});
