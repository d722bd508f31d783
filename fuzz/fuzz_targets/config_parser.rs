#![no_main]

use libfuzzer_sys::fuzz_target;
use lum_debug::config::parse_config_str;
use lum_debug::{DebugRegistry, LoaderOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Rejecting parse may fail, but must not panic
        let _ = parse_config_str(input, LoaderOptions::default());

        // Skipping parse always succeeds and every entry can be applied
        if let Ok(entries) = parse_config_str(input, LoaderOptions::skip_malformed()) {
            let debug = DebugRegistry::new();
            debug.extend(entries);
            for (flag, _) in debug.snapshot() {
                let _ = debug.enabled(&flag);
            }
        }
    }
});
