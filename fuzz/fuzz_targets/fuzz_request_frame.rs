#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use soil_probe::codec::{build_read_request, crc16};

#[derive(Debug, Arbitrary)]
struct Request {
    slave: u8,
    register: u16,
    count: u16,
}

fuzz_target!(|req: Request| {
    let frame = build_read_request(req.slave, req.register, req.count);
    assert_eq!(frame[0], req.slave);
    assert_eq!(frame[1], 0x03);
    assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), req.register);
    assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), req.count);
    assert_eq!(u16::from_le_bytes([frame[6], frame[7]]), crc16(&frame[..6]));
});
