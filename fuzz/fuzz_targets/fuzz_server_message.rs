#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frame parsing may reject input but must never panic.
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = battle_sync_client::protocol::ServerMessage::parse(text);
    }
});
