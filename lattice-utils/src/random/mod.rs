//! Random number generation.
//!
//! Every world carries exactly one generator; its only consumer is the
//! ownership-token mint, so the implementation favors determinism and
//! statelessness over cryptographic strength.

mod xoroshiro;

pub use xoroshiro::Xoroshiro;
