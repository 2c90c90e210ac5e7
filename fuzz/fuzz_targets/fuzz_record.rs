#![no_main]

use idservice::storage::{format_record, parse_record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must never panic the parser.
    let contents = String::from_utf8_lossy(data);

    // Whatever parses must render back to the same digits. Leading zeros and a
    // `\r\n` terminator are tolerated, so both are normalized before comparing.
    if let Ok(value) = parse_record(&contents) {
        let canonical = format_record(value);
        let normalized = contents.replace("\r\n", "\n");
        assert_eq!(normalized.trim_start_matches('0'), canonical.trim_start_matches('0'));
    }
});
