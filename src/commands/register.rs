use anyhow::Context;
use indicatif::ProgressBar;
use log::debug;
use std::time::Duration;

use crate::client::Client;
use crate::commands::read_credential;
use crate::config::Config;

/// Registers the user's signature with the server:
///     - Read username/password (prompting for what was not given)
///     - Load or create the user's salt and derive the signature
///     - Send the registration request and print the server's reply
pub async fn run(config: Config, username: Option<String>) -> anyhow::Result<()> {
    let credential = read_credential(username)?;
    debug!(
        "Registering {} at {}:{}",
        credential.username(),
        config.server.host,
        config.server.port
    );

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Registering with server");

    let mut client = Client::new(config);
    let result = client.register(&credential).await;
    client.close().await;
    spinner.finish_and_clear();

    let message =
        result.with_context(|| format!("registration of {} failed", credential.username()))?;
    if message.is_empty() {
        println!("Registered {}", credential.username());
    } else {
        println!("Registered {}: {}", credential.username(), message);
    }
    Ok(())
}
