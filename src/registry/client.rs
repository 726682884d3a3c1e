//! Registry client
//!
//! Performs the two network operations against the Registry Service:
//! read an entry, write a signed entry. All calls are synchronous
//! blocking round-trips over a shared connection-reusing agent.

use std::time::Duration;

use serde::Serialize;

use crate::config::RegistryConfig;
use crate::crypto::{hash_data_key, Identity};
use crate::error::{Result, TabulaError};

use super::entry::{ReadResponse, SignedEntry};

/// Client for one identity against one registry endpoint
pub struct RegistryClient {
    /// Keys used for every read query and write signature
    identity: Identity,

    /// Endpoint and timeout settings
    config: RegistryConfig,

    /// Resolved registry API URL
    url: String,

    /// Shared HTTP agent (connection reuse across calls)
    agent: ureq::Agent,
}

/// `publickey` object of the write body
#[derive(Serialize)]
struct WireKey {
    algorithm: &'static str,
    key: Vec<u8>,
}

/// JSON body of a registry write
#[derive(Serialize)]
struct WriteRequest {
    publickey: WireKey,
    datakey: String,
    revision: u64,
    data: Vec<u8>,
    signature: Vec<u8>,
}

impl RegistryClient {
    /// Create a client for the given identity and config
    pub fn new(identity: Identity, config: RegistryConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.read_timeout)
            .timeout_read(config.read_timeout)
            .timeout_write(config.read_timeout)
            .build();
        let url = config.registry_url();

        tracing::debug!(%url, "registry client ready");

        Self {
            identity,
            config,
            url,
            agent,
        }
    }

    /// The identity this client signs and queries with
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The client's configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Write an entry to the registry
    ///
    /// The revision must strictly exceed the currently stored revision
    /// (1 creates an absent key). Success is a content-less
    /// acknowledgement; anything else is `RegistryRejected` carrying the
    /// service's diagnostic text.
    pub fn set_entry(&self, data_key: &str, data: &str, revision: u64) -> Result<()> {
        let entry = SignedEntry::create(&self.identity, data_key, data, revision)?;

        tracing::debug!(datakey = %entry.data_key_hash, revision, "writing registry entry");

        let request = WriteRequest {
            publickey: WireKey {
                algorithm: "ed25519",
                key: self.identity.public_key().to_vec(),
            },
            datakey: entry.data_key_hash.clone(),
            revision: entry.revision,
            data: entry.data.clone(),
            signature: entry.signature.to_vec(),
        };

        match self.agent.post(&self.url).send_json(&request) {
            Ok(response) if response.status() == 204 => {
                tracing::debug!(datakey = %entry.data_key_hash, "entry stored");
                Ok(())
            }
            Ok(response) => Err(TabulaError::RegistryRejected(read_body(response))),
            Err(ureq::Error::Status(_, response)) => {
                Err(TabulaError::RegistryRejected(read_body(response)))
            }
            Err(ureq::Error::Transport(transport)) => Err(classify_transport(&transport)),
        }
    }

    /// Read an entry, waiting up to the configured read timeout
    pub fn get_entry(&self, data_key: &str) -> Result<(String, u64)> {
        self.get_entry_with_timeout(data_key, self.config.read_timeout)
    }

    /// Read an entry with an explicit timeout
    ///
    /// Returns the entry data and its stored revision. The service does
    /// not answer for absent keys, so absence and a stalled server are
    /// indistinguishable here; both surface as `LookupTimeout` once the
    /// timeout elapses.
    pub fn get_entry_with_timeout(
        &self,
        data_key: &str,
        timeout: Duration,
    ) -> Result<(String, u64)> {
        let datakey = hash_data_key(data_key);

        tracing::trace!(%datakey, ?timeout, "reading registry entry");

        let response = self
            .agent
            .get(&self.url)
            .query("publickey", &self.identity.query_key())
            .query("datakey", &datakey)
            .timeout(timeout)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, response) => TabulaError::RegistryRejected(format!(
                    "HTTP {}: {}",
                    code,
                    read_body(response)
                )),
                ureq::Error::Transport(transport) => classify_transport(&transport),
            })?;

        let body: ReadResponse = serde_json::from_reader(response.into_reader())
            .map_err(|err| TabulaError::BadResponse(err.to_string()))?;

        let bytes = hex::decode(&body.data)
            .map_err(|err| TabulaError::BadResponse(format!("data is not valid hex: {err}")))?;
        let data = String::from_utf8(bytes)
            .map_err(|err| TabulaError::BadResponse(format!("data is not valid UTF-8: {err}")))?;

        Ok((data, body.revision))
    }
}

/// Drain a response body for a diagnostic message
fn read_body(response: ureq::Response) -> String {
    response
        .into_string()
        .unwrap_or_else(|_| "<unreadable response body>".to_string())
}

/// Map a transport failure onto the error taxonomy
///
/// Timeouts get their own variant: the table layer reads them as "entry
/// absent" for index keys.
fn classify_transport(transport: &ureq::Transport) -> TabulaError {
    let detail = format!("{:?}: {}", transport.kind(), transport);
    let lower = detail.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        TabulaError::LookupTimeout
    } else {
        TabulaError::Transport(detail)
    }
}
