//! # Commands Module
//!
//! The two command handlers of blockfetch:
//!
//! ## `register`
//! Registers a user with the server:
//! - Loads the user's salt, generating and saving one on first use
//! - Derives the password signature
//! - Sends a registration request and prints the server's message
//!
//! ## `get`
//! Retrieves files from the server:
//! - Optionally registers first
//! - Requests each path, reassembling the blocked response
//! - Writes every completed file (including empty ones) to the output directory

pub mod get;
pub mod register;

use anyhow::Context;
use std::io;

use crate::utils::{prompt_line, Credential};

/// Builds a credential from the optional command-line username, prompting
/// on stdin for anything missing.
pub(crate) fn read_credential(username: Option<String>) -> anyhow::Result<Credential> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let username = match username {
        Some(name) => name,
        None => prompt_line(&mut input, "Enter a username to proceed: ")
            .context("could not read username")?,
    };
    let password = prompt_line(&mut input, "Enter your password to proceed: ")
        .context("could not read password")?;

    Credential::new(username, password).context("invalid credentials")
}
