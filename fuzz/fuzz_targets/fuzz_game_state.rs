#![no_main]

use libfuzzer_sys::fuzz_target;
use table_talk_client::protocol::GameStateUpdate;
use table_talk_client::Session;

fuzz_target!(|data: &[u8]| {
    // Parse an arbitrary game_state payload and apply it to a fresh session.
    // The session must absorb any partial update without panicking.
    if let Ok(update) = serde_json::from_slice::<GameStateUpdate>(data) {
        let mut session = Session::new("player_fuzz", "fuzz");
        session.update_game_state(&update);
        let _ = session.player_count();
    }
});
