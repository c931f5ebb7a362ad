#![no_main]

use libfuzzer_sys::fuzz_target;
use truth_or_trick_client::protocol::ClientMessage;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes as a client message must encode again.
    if let Ok(msg) = serde_json::from_slice::<ClientMessage>(data) {
        let encoded = serde_json::to_string(&msg);
        assert!(encoded.is_ok());
    }
});
