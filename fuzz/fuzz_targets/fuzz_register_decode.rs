#![no_main]

use libfuzzer_sys::fuzz_target;
use wt16_modbus::codec::decode_entry;
use wt16_modbus::{ByteOrder, RawPayload, REGISTER_MAP};

// Every register entry must decode any payload shape without panicking.
fuzz_target!(|data: &[u8]| {
    let words: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    let bits: Vec<bool> = data.iter().map(|b| b & 1 == 1).collect();

    for spec in REGISTER_MAP {
        let _ = decode_entry(spec, &RawPayload::Words(words.clone()), ByteOrder::BigEndianSwap);
        let _ = decode_entry(spec, &RawPayload::Bits(bits.clone()), ByteOrder::BigEndian);
    }
});
