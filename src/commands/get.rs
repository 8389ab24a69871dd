use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error};
use std::path::{Path, PathBuf};

use crate::client::Client;
use crate::commands::read_credential;
use crate::config::Config;
use crate::cryptography::digest_hex;
use crate::output::write_output;
use crate::utils::Credential;

/// Retrieves one or more files:
///     - Read username/password (prompting for what was not given)
///     - Optionally register first, over the same or a new connection
///       depending on the session policy
///     - Request each path in turn, reassemble its blocks and save it
///
/// A failed file is reported and the remaining ones are still fetched.
pub async fn run(
    mut config: Config,
    username: Option<String>,
    paths: Vec<String>,
    register: bool,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(dir) = output_dir {
        config.storage.output_dir = dir;
    }
    let output_dir = config.storage.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("could not create output directory {:?}", output_dir))?;

    let credential = read_credential(username)?;
    let mut client = Client::new(config);

    if register {
        let message = client
            .register(&credential)
            .await
            .with_context(|| format!("registration of {} failed", credential.username()))?;
        println!("Registered {}: {}", credential.username(), message);
    }

    let mut failures = 0;
    for path in &paths {
        client.set_progress(block_progress_bar(path));

        match fetch_file(&mut client, &credential, path, &output_dir).await {
            Ok((saved, data)) => {
                debug!("Saved {} to {:?}", path, saved);
                if data.is_empty() {
                    println!("{} is empty; created {}", path, saved.display());
                } else {
                    println!("File saved: {} ({} bytes)", saved.display(), data.len());
                }
                println!("sha256: {}", digest_hex(&data));
            }
            Err(e) => {
                error!("{:#}", e);
                failures += 1;
            }
        }
    }
    client.close().await;

    if failures > 0 {
        bail!("{} of {} files could not be retrieved", failures, paths.len());
    }
    Ok(())
}

/// Retrieves `path` and saves it under `output_dir`, returning the saved
/// location and the data. Nothing is written unless the whole response
/// arrived.
pub async fn fetch_file(
    client: &mut Client,
    credential: &Credential,
    path: &str,
    output_dir: &Path,
) -> anyhow::Result<(PathBuf, Vec<u8>)> {
    let data = client
        .retrieve(credential, path)
        .await
        .with_context(|| format!("could not retrieve {}", path))?;
    let saved = write_output(output_dir, path, &data)
        .with_context(|| format!("could not save {}", path))?;
    Ok((saved, data))
}

fn block_progress_bar(path: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.black}] {pos}/{len} blocks {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(path.to_string());
    bar
}
