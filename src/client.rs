//! Client tying credentials, salts and the wire protocol together.
//!
//! Each request is handled to completion before the next one starts.
//! Under `ConnectionPolicy::Reopen` every request gets its own connection;
//! under `Reuse` a connection that finished a request cleanly carries the
//! next one. A connection that saw any error is always discarded.

use indicatif::ProgressBar;
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::{Config, ConnectionPolicy};
use crate::cryptography::{derive_signature, Signature};
use crate::error::FetchError;
use crate::networking::Session;
use crate::protocol::{FrameLimits, RequestFrame};
use crate::reassembly::read_response;
use crate::salt_store::SaltStore;
use crate::utils::Credential;

pub struct Client {
    config: Config,
    salts: SaltStore,
    session: Option<Session<TcpStream>>,
    progress: ProgressBar,
}

impl Client {
    pub fn new(config: Config) -> Self {
        let salts = SaltStore::new(&config.storage.salt_file);
        Self {
            config,
            salts,
            session: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Progress bar updated with the block count of the next responses.
    pub fn set_progress(&mut self, progress: ProgressBar) {
        self.progress = progress;
    }

    /// Signature for `credential`, creating and persisting the user's salt
    /// on first use.
    pub fn signature_for(&self, credential: &Credential) -> Result<Signature, FetchError> {
        let salt = self.salts.get_or_create(credential.username())?;
        Ok(derive_signature(credential.password(), &salt))
    }

    /// Registers the user's signature and returns the server's status message.
    pub async fn register(&mut self, credential: &Credential) -> Result<String, FetchError> {
        let signature = self.signature_for(credential)?;
        let frame = RequestFrame::encode_register(credential.username(), &signature)?;

        info!("Registering {}", credential.username());
        let response = self.exchange(&frame).await?;
        let message = String::from_utf8_lossy(&response);
        Ok(message.trim_end_matches('\0').trim().to_string())
    }

    /// Fetches `path` and returns its exact contents; an empty vector is an
    /// existing empty file.
    pub async fn retrieve(
        &mut self,
        credential: &Credential,
        path: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let signature = self.signature_for(credential)?;
        let frame = RequestFrame::encode_retrieve(credential.username(), &signature, path)?;

        info!("Requesting {} as {}", path, credential.username());
        let data = self.exchange(&frame).await?;
        info!("Received {} ({} bytes)", path, data.len());
        Ok(data)
    }

    /// Closes a connection kept open under the reuse policy.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }

    async fn exchange(&mut self, frame: &RequestFrame) -> Result<Vec<u8>, FetchError> {
        let mut session = match self.session.take() {
            Some(session) => {
                debug!("Reusing open connection");
                session
            }
            None => Session::<TcpStream>::connect(&self.config).await?,
        };

        let result = round_trip(&mut session, frame, self.config.limits, &self.progress).await;

        match (&result, self.config.session.connection) {
            (Ok(_), ConnectionPolicy::Reuse) => self.session = Some(session),
            _ => session.close().await,
        }
        result
    }
}

/// Sends one request and reads its whole response over `session`.
pub async fn round_trip<S>(
    session: &mut Session<S>,
    frame: &RequestFrame,
    limits: FrameLimits,
    progress: &ProgressBar,
) -> Result<Vec<u8>, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.write_exact(&frame.to_bytes()).await?;
    read_response(session, limits, progress).await
}
