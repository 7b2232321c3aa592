//! Command-line glue over `policy-merge-core`.
//!
//! The binary merges policy documents, renders their diffs against the base
//! document, and validates documents against TOML profiles. The modules here
//! hold the parts that are useful outside the binary:
//!
//! - [`profile`]: validation profiles, embedded or loaded from a directory
//! - [`validate`]: validation reports and the profile-backed validator
//! - [`report`]: colored terminal rendering of diffs

pub mod profile;
pub mod report;
pub mod validate;
