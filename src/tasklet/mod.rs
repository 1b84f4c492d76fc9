//! # Tasklet Module
//!
//! Single-shot operations run at the end of a stage, such as packaging a table
//! into its CSV-in-ZIP artifact.

pub mod zip;
