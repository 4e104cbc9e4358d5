#![no_main]

use libfuzzer_sys::fuzz_target;
use quiz_live_client::stomp;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(frames) = stomp::parse_message(text) {
        for frame in frames {
            let _ = frame.header("subscription");
            let _ = stomp::parse_message(&frame.encode());
        }
    }
});
