//! Fuzz target for field escaping
//!
//! Escaped text must never contain a reserved glyph, and unescaping it must
//! restore the original.

#![no_main]

use athena_proto::{escape, unescape};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: String| {
    let escaped = escape(&text);
    assert!(!escaped.contains(['#', '%', '$', '&']));
    assert_eq!(unescape(&escaped), text);
});
