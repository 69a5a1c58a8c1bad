#![no_main]

use libfuzzer_sys::fuzz_target;
use wt16_modbus::TcpTransport;

// Arbitrary bytes off the wire must never panic the frame decoder.
fuzz_target!(|data: &[u8]| {
    if let Ok((_, response)) = TcpTransport::decode_frame(data) {
        let _ = response.get_exception();
        let _ = response.parse_bits();
        let _ = response.parse_registers();
        let _ = response.verify_write_echo(1, 480);
    }
});
