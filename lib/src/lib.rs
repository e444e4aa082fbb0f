//! # Developer workstation provisioning
//!
//! This crate prepares a macOS or Linux workstation for working with the
//! organization's private Go repositories: it installs prerequisite tools,
//! establishes SSH access to the Git host, configures Go module privacy and
//! installs the internal command line tool.

// See https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![forbid(unused_must_use)]
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod cli;
mod config;
mod goprivate;
mod installers;
mod interaction;
mod outcome;
mod platform;
mod provision;
mod runner;
mod ssh;
mod store;
mod tool;
mod utils;

#[cfg(test)]
mod fixture;
