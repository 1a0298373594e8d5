#![no_main]

use libfuzzer_sys::fuzz_target;
use qc_outliers::{analyze, input, EngineConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Parsing must reject malformed tables without panicking
        if let Ok(matrix) = input::parse_metrics(text) {
            if matrix.n_rows() > 2 && matrix.n_rows() < 64 {
                let _ = analyze(&matrix, &EngineConfig::new(2));
            }
        }
    }
});
