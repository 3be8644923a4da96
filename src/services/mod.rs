pub mod apple_identity_provider;
