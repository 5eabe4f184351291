#![no_main]

use libfuzzer_sys::fuzz_target;
use soil_probe::codec::{parse_read_response, verify_response_crc};

// Arbitrary bytes from the wire must never panic the parser.
fuzz_target!(|data: &[u8]| {
    let Some((&slave, frame)) = data.split_first() else {
        return;
    };

    if let Ok(value) = parse_read_response(frame, slave) {
        assert!(frame.len() >= 7);
        assert_eq!(value, u16::from_be_bytes([frame[3], frame[4]]));
    }
    let _ = verify_response_crc(frame);
});
