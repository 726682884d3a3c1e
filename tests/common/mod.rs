//! In-process stub Registry Service for integration tests
//!
//! Implements the wire contract end to end: reads answer stored entries
//! and stay silent for absent keys (absence surfaces to the client as a
//! read timeout), writes verify the Ed25519 signature over the canonical
//! signing digest and enforce the monotonic revision rule.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde_json::Value;

use tabula::registry::SignedEntry;
use tabula::RegistryConfig;

/// How long the stub stays silent on a read for an absent key. Must
/// exceed every client timeout the tests configure.
const ABSENT_KEY_SILENCE: Duration = Duration::from_millis(1500);

/// Stored entries keyed by (public key hex, hashed data key hex)
type Store = Arc<Mutex<HashMap<(String, String), (Vec<u8>, u64)>>>;

/// Handle to a running stub registry
pub struct StubRegistry {
    addr: SocketAddr,
}

impl StubRegistry {
    /// Bind an ephemeral port and serve the registry contract until the
    /// test process exits
    pub fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub registry");
        let addr = listener.local_addr().expect("stub registry addr");
        let store: Store = Arc::new(Mutex::new(HashMap::new()));

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let store = Arc::clone(&store);
                // One thread per connection: scan workers hit the stub
                // concurrently
                thread::spawn(move || {
                    let _ = serve(stream, store);
                });
            }
        });

        Self { addr }
    }

    /// Portal base URL to plug into a RegistryConfig
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

/// Route test log output through `RUST_LOG`, once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Client config with timeouts sized for the stub
pub fn test_config(stub: &StubRegistry) -> RegistryConfig {
    RegistryConfig::builder()
        .endpoint(stub.base_url())
        .read_timeout(Duration::from_millis(500))
        .index_timeout(Duration::from_millis(250))
        .retry_delay(Duration::from_millis(50))
        .retry_attempts(0)
        .build()
}

fn serve(mut stream: TcpStream, store: Store) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    match method {
        "GET" => handle_read(&mut stream, target, &store),
        "POST" => {
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body)?;
            handle_write(&mut stream, &body, &store)
        }
        _ => respond(&mut stream, 400, "unsupported method"),
    }
}

fn handle_read(stream: &mut TcpStream, target: &str, store: &Store) -> std::io::Result<()> {
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
    let params: HashMap<&str, String> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k, v.replace("%3A", ":").replace("%3a", ":")))
        .collect();

    let Some(publickey) = params.get("publickey") else {
        return respond(stream, 400, "missing publickey");
    };
    let Some(datakey) = params.get("datakey") else {
        return respond(stream, 400, "missing datakey");
    };
    let pk_hex = publickey.strip_prefix("ed25519:").unwrap_or(publickey);

    let stored = {
        let store = store.lock().unwrap();
        store.get(&(pk_hex.to_string(), datakey.clone())).cloned()
    };

    match stored {
        Some((data, revision)) => {
            let body = format!(
                "{{\"data\":\"{}\",\"revision\":{}}}",
                hex::encode(data),
                revision
            );
            respond(stream, 200, &body)
        }
        None => {
            // The real service never answers for absent keys; the client
            // gives up when its read timeout elapses
            thread::sleep(ABSENT_KEY_SILENCE);
            Ok(())
        }
    }
}

fn handle_write(stream: &mut TcpStream, body: &[u8], store: &Store) -> std::io::Result<()> {
    let Ok(request) = serde_json::from_slice::<Value>(body) else {
        return respond(stream, 400, "unparseable body");
    };

    let Some(key_bytes) = int_array(&request["publickey"]["key"]) else {
        return respond(stream, 400, "missing publickey.key");
    };
    let Some(datakey) = request["datakey"].as_str() else {
        return respond(stream, 400, "missing datakey");
    };
    let Some(revision) = request["revision"].as_u64() else {
        return respond(stream, 400, "missing revision");
    };
    let Some(data) = int_array(&request["data"]) else {
        return respond(stream, 400, "missing data");
    };
    let Some(signature) = int_array(&request["signature"]) else {
        return respond(stream, 400, "missing signature");
    };

    if data.len() > 113 {
        return respond(stream, 400, "data exceeds 113 bytes");
    }

    // Verify the detached signature over the canonical signing digest
    let Ok(pk_array) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
        return respond(stream, 400, "publickey is not 32 bytes");
    };
    let Ok(sig_array) = <[u8; 64]>::try_from(signature.as_slice()) else {
        return respond(stream, 400, "signature is not 64 bytes");
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_array) else {
        return respond(stream, 400, "invalid public key");
    };
    let Ok(datakey_bytes) = hex::decode(datakey) else {
        return respond(stream, 400, "datakey is not hex");
    };
    let Ok(data_str) = std::str::from_utf8(&data) else {
        return respond(stream, 400, "data is not utf-8");
    };

    let digest = SignedEntry::signing_digest(&datakey_bytes, data_str, revision);
    let signature = Signature::from_bytes(&sig_array);
    if verifying_key.verify(&digest, &signature).is_err() {
        return respond(stream, 400, "signature verification failed");
    }

    // Monotonic revision rule
    let store_key = (hex::encode(pk_array), datakey.to_string());
    let mut store = store.lock().unwrap();
    if let Some((_, stored_revision)) = store.get(&store_key) {
        if revision <= *stored_revision {
            return respond(
                stream,
                400,
                &format!("revision {revision} does not advance stored revision {stored_revision}"),
            );
        }
    }
    store.insert(store_key, (data, revision));
    drop(store);

    respond(stream, 204, "")
}

fn int_array(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|n| n.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

fn respond(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        _ => "Bad Request",
    };
    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}
