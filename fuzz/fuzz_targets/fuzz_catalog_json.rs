//! Fuzz target for JSON catalog and index loading.
//!
//! Arbitrary bytes must only ever yield Ok or Err, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use swapline::component::JsonCatalog;
use swapline::scope::ComponentIndex;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let _ = JsonCatalog::from_json(json);
        let _ = ComponentIndex::from_json(json);
    }
});
