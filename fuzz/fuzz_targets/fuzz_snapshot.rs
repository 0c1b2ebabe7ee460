#![no_main]

use battle_sync_client::snapshot::normalize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any JSON value must normalize, the clamps must hold, and normalizing
    // the canonical form must change nothing.
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let state = normalize(&value);
    for player in &state.players {
        assert!(player.max_hp >= 1);
        assert!(player.hp <= player.max_hp);
    }
    if let Ok(canonical) = serde_json::to_value(&state) {
        assert_eq!(normalize(&canonical), state);
    }
});
