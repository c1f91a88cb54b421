//! Default stack name generation for the create wizard

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "chatty", "cheery", "clever", "daring", "friendly", "gentle", "handy",
    "lucky", "merry", "nimble", "patient", "polite", "quick", "steady", "sunny", "tidy", "witty",
    "zesty",
];

const NOUNS: &[&str] = &[
    "butler", "courier", "concierge", "dispatcher", "echo", "envoy", "greeter", "helper",
    "herald", "liaison", "messenger", "operator", "parrot", "porter", "relay", "responder",
    "scribe", "sidekick", "valet", "whisper",
];

/// Generate a default stack name like "chatty-courier-2847"
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u16 = rng.gen_range(1000..10000);
    format!("{}-{}-{}", adjective, noun, number)
}
