//! The self-reported server status and the response payloads derived from it.
//!
//! Everything a client can ever be told is derived from the configuration exactly once, at
//! server construction. The resulting [`StatusPayloads`] are immutable afterwards and shared
//! read-only across all connection handlers.

use crate::config::Config;
use crate::protocol::Error;
use crate::protocol::legacy::encode_utf16_be;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

/// The information on the protocol version of a server.
#[derive(Debug, Serialize)]
pub struct ServerVersion {
    /// The textual protocol version to display this version visually.
    pub name: String,
    /// The numeric protocol version (for compatibility checking).
    pub protocol: i32,
}

/// The information on a single, sampled player entry.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ServerPlayer {
    /// The visual name to display this player.
    pub name: String,
    /// The unique identifier to reference this player.
    pub id: String,
}

/// The information on the current, maximum and sampled players.
#[derive(Debug, Serialize)]
pub struct ServerPlayers {
    /// The maximum number of players that can join (slots).
    pub max: u32,
    /// The current number of players that are online at this moment.
    pub online: u32,
    /// The list of player information samples (version hover).
    pub sample: Vec<ServerPlayer>,
}

/// The description (MOTD) of a server as a plain text component.
#[derive(Debug, Serialize)]
pub struct ServerDescription {
    /// The text of the description, may contain `§` formatting codes.
    pub text: String,
}

/// The self-reported status of this server with all public metadata.
#[derive(Debug, Serialize)]
pub struct ServerStatus {
    /// The version and protocol information of the server.
    pub version: ServerVersion,
    /// The current, maximum and sampled players of the server.
    pub players: ServerPlayers,
    /// The description (MOTD) of this server.
    pub description: ServerDescription,
    /// The optional favicon of the server as a base64 data URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

/// The precomputed response payloads, built once from the configuration.
#[derive(Debug)]
pub struct StatusPayloads {
    /// The JSON status document returned for modern status requests.
    pub status_json: String,
    /// The JSON text component returned for login attempts.
    pub kick_json: String,
    /// The complete legacy (1.6) response packet, `0xFF` framing included.
    pub legacy_blob: Vec<u8>,
}

impl StatusPayloads {
    /// Builds all response payloads from the configuration.
    ///
    /// Every configured sample gets a freshly generated UUID that stays stable for the process
    /// lifetime. The favicon is embedded only if the configured icon file can actually be read.
    pub fn build(config: &Config) -> Result<Self, Error> {
        let sample: Vec<ServerPlayer> = config
            .samples
            .iter()
            .map(|name| ServerPlayer {
                name: name.clone(),
                id: Uuid::new_v4().to_string(),
            })
            .collect();
        let slots = sample.len() as u32;

        let status = ServerStatus {
            version: ServerVersion {
                name: config.version_text.clone(),
                protocol: config.protocol,
            },
            players: ServerPlayers {
                max: slots,
                online: slots,
                sample,
            },
            description: ServerDescription {
                text: config.motd.clone(),
            },
            favicon: load_favicon(&config.server_icon),
        };

        let status_json = serde_json::to_string(&status)?;
        let kick_json = serde_json::to_string(&json!({ "text": config.kick_message }))?;
        let legacy_blob = build_legacy_blob(config.protocol, config.samples.len());
        debug!("response payloads built");

        Ok(Self {
            status_json,
            kick_json,
            legacy_blob,
        })
    }
}

/// Reads and base64-encodes the configured server icon, or `None` if there is no usable file.
///
/// Without an icon the status document must omit the `favicon` field entirely.
fn load_favicon(path: &str) -> Option<String> {
    match std::fs::read(Path::new(path)) {
        Ok(bytes) => Some(format!("data:image/png;base64,{}", STANDARD.encode(bytes))),
        Err(err) => {
            warn!(path, cause = %err, "server icon not readable, status omits the favicon");
            None
        }
    }
}

/// Builds the legacy (1.6) response packet.
///
/// 1.6 clients only render the `§1`-prefixed, null-separated form and cannot display the real
/// MOTD, so the description tells them to use a newer client. The sample count doubles as the
/// player counts, mirroring the modern document.
fn build_legacy_blob(protocol: i32, samples: usize) -> Vec<u8> {
    let payload = format!(
        "§1\0{protocol}\0Too old!\0The client is too old. Please use client 1.7+\0{samples}\0{samples}\0"
    );
    let encoded = encode_utf16_be(&payload);

    let mut blob = Vec::with_capacity(3 + encoded.len());
    blob.push(0xFF);
    blob.extend_from_slice(&((encoded.len() / 2) as u16).to_be_bytes());
    blob.extend_from_slice(&encoded);
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::legacy::decode_utf16_be;
    use serde_json::Value;
    use std::io::Write;

    #[test]
    fn status_document_matches_the_configuration() {
        let config = Config::default();
        let payloads = StatusPayloads::build(&config).expect("build failed");

        let document: Value =
            serde_json::from_str(&payloads.status_json).expect("status is not valid JSON");
        assert_eq!(document["version"]["name"], config.version_text);
        assert_eq!(document["version"]["protocol"], config.protocol);
        assert_eq!(document["players"]["max"], config.samples.len() as u32);
        assert_eq!(document["players"]["online"], config.samples.len() as u32);
        assert_eq!(document["description"]["text"], config.motd);

        let sample = document["players"]["sample"]
            .as_array()
            .expect("sample is not an array");
        assert_eq!(sample.len(), config.samples.len());
        for (entry, name) in sample.iter().zip(&config.samples) {
            assert_eq!(&entry["name"], name);
            let id = entry["id"].as_str().expect("sample id is not a string");
            assert_eq!(
                Uuid::parse_str(id).expect("sample id is not a UUID").get_version_num(),
                4
            );
        }
    }

    #[test]
    fn favicon_is_absent_without_an_icon_file() {
        let config = Config {
            server_icon: "does-not-exist.png".to_string(),
            ..Config::default()
        };
        let payloads = StatusPayloads::build(&config).expect("build failed");

        let document: Value =
            serde_json::from_str(&payloads.status_json).expect("status is not valid JSON");
        assert!(
            document.get("favicon").is_none(),
            "favicon must be absent, not null or empty"
        );
    }

    #[test]
    fn favicon_embeds_the_icon_as_a_data_url() {
        let mut icon = tempfile::NamedTempFile::new().expect("temp file failed");
        icon.write_all(&[0x89, 0x50, 0x4E, 0x47]).expect("write failed");

        let config = Config {
            server_icon: icon.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        let payloads = StatusPayloads::build(&config).expect("build failed");

        let document: Value =
            serde_json::from_str(&payloads.status_json).expect("status is not valid JSON");
        assert_eq!(document["favicon"], "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn kick_payload_is_a_text_component() {
        let config = Config::default();
        let payloads = StatusPayloads::build(&config).expect("build failed");

        let component: Value =
            serde_json::from_str(&payloads.kick_json).expect("kick is not valid JSON");
        assert_eq!(component["text"], config.kick_message);
    }

    #[test]
    fn legacy_blob_is_framed_and_counted() {
        let blob = build_legacy_blob(2, 2);

        assert_eq!(blob[0], 0xFF);
        let chars = u16::from_be_bytes([blob[1], blob[2]]) as usize;
        assert_eq!(chars * 2, blob.len() - 3);

        let payload = decode_utf16_be(&blob[3..]).expect("decode failed");
        assert_eq!(
            payload,
            "§1\02\0Too old!\0The client is too old. Please use client 1.7+\02\02\0"
        );
    }
}
