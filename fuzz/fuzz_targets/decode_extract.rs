#![no_main]
use libfuzzer_sys::fuzz_target;
use phaeton::{dispatch, CountingHandler, PrimitiveDecoder};

fuzz_target!(|data: &[u8]| {
    if let Ok(decoder) = PrimitiveDecoder::new(std::io::Cursor::new(data)) {
        let _ = dispatch(decoder, CountingHandler::new());
    }
});
