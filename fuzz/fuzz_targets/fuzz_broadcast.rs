#![no_main]

use libfuzzer_sys::fuzz_target;
use quiz_live_client::decoder::{self, Channel};
use quiz_live_client::{ClientEvent, GameView};

const CHANNELS: [Channel; 5] = [
    Channel::State,
    Channel::Timer,
    Channel::Teams,
    Channel::Host,
    Channel::Errors,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let Ok(body) = std::str::from_utf8(body) else {
        return;
    };
    let channel = CHANNELS[usize::from(selector) % CHANNELS.len()];

    // Decoded events must never break the reducer.
    if let Ok(event) = decoder::decode(channel, body) {
        let mut view = GameView::new();
        view.apply(ClientEvent::Game(event));
        let _ = view.available_commands();
        let _ = view.timer().progress();
    }
});
