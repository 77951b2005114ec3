//! Fuzz target for the intent parser.
//!
//! Arbitrary text must always produce an intent: either a path the
//! vocabulary can reach or a request for clarification.

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use swapline::intent::IntentParser;

static PARSER: OnceLock<Option<IntentParser>> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let Some(parser) = PARSER.get_or_init(|| IntentParser::system_health().ok()) else {
        return;
    };
    if let Ok(text) = std::str::from_utf8(data) {
        let intent = parser.parse(text);
        if let Some(target) = &intent.target {
            assert!(parser.vocabulary().paths().contains(target));
        }
    }
});
