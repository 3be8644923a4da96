pub mod client_assertion;
pub mod id_token;
pub mod primitives;
pub mod public_keys;
pub mod token_exchange;
pub mod user_profile;
