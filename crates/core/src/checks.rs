//! # Checks
//!
//! Pure checks that DonkeyOps performs on pull requests.
//!
//! - `commits`: Validates commit messages against the repository's commit conventions
//!
//! Checks never talk to GitHub. `DonkeyOps` gathers the inputs, runs the check
//! and reports the outcome.

pub mod commits;
