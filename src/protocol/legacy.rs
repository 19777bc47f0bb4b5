//! The legacy (1.6) Server List Ping dialect.
//!
//! The exchange is rigid and positionally framed: after the `0xFE` sentinel the client sends a
//! fixed header, the `MC|PingHost` channel name and a short payload with its protocol version,
//! hostname and port, all strings in counted UTF-16-BE. The server answers with one
//! `0xFF`-framed kick-style packet and the connection ends. Everything that deviates from the
//! expected layout closes the connection without a reply.
//!
//! [Minecraft Docs](https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Server_List_Ping#1.6)

use crate::protocol::reader::FrameReader;
use crate::protocol::{Error, read_exactly, write_frame};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// The plugin channel name every 1.6 ping announces.
const PING_HOST_CHANNEL: &str = "MC|PingHost";

/// The fixed UTF-16 character count of [`PING_HOST_CHANNEL`].
const PING_HOST_CHARS: u16 = 11;

/// Serves a legacy ping whose `0xFE` sentinel has already been consumed by the dialect
/// demultiplexer, replying with the precomputed response blob.
pub(crate) async fn serve<S>(stream: &mut S, response: &[u8]) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header = read_exactly(stream, 2).await?;
    if header != [0x01, 0xFA] {
        return Err(Error::UnexpectedFrame {
            reason: "legacy ping header is not 0xFE 0x01 0xFA",
        });
    }

    let channel_chars = read_u16(stream).await?;
    if channel_chars != PING_HOST_CHARS {
        return Err(Error::UnexpectedFrame {
            reason: "legacy ping channel length mismatch",
        });
    }

    let channel = read_exactly(stream, usize::from(PING_HOST_CHARS) * 2).await?;
    if decode_utf16_be(&channel)? != PING_HOST_CHANNEL {
        return Err(Error::UnexpectedFrame {
            reason: "legacy ping channel is not MC|PingHost",
        });
    }

    // the rest of the request is length-prefixed and parsed from a sub-buffer
    let payload_length = read_u16(stream).await?;
    let payload = read_exactly(stream, usize::from(payload_length)).await?;
    let mut reader = FrameReader::new(&payload);

    let protocol_version = reader.read_u8()?;
    let host_chars = usize::from(reader.read_u16()?);

    // the hostname takes everything between the leading 3 bytes and the trailing 4-byte port
    let host_bytes = usize::from(payload_length)
        .checked_sub(7)
        .ok_or(Error::UnexpectedFrame {
            reason: "legacy ping payload too short",
        })?;
    if host_chars * 2 != host_bytes {
        return Err(Error::UnexpectedFrame {
            reason: "legacy ping hostname length mismatch",
        });
    }

    let hostname = decode_utf16_be(reader.read_bytes(host_bytes)?)?;
    let port = reader.read_i32()?;
    debug!(protocol_version, hostname = %hostname, port, "parsed legacy (1.6) ping");

    write_frame(stream, response).await
}

async fn read_u16<S>(stream: &mut S) -> Result<u16, Error>
where
    S: AsyncRead + Unpin,
{
    let raw = read_exactly(stream, 2).await?;
    Ok(u16::from_be_bytes([raw[0], raw[1]]))
}

/// Decodes counted UTF-16-BE bytes into a string.
pub(crate) fn decode_utf16_be(bytes: &[u8]) -> Result<String, Error> {
    if bytes.len() % 2 != 0 {
        return Err(Error::InvalidEncoding);
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|_| Error::InvalidEncoding)
}

/// Encodes a string as UTF-16-BE bytes.
pub(crate) fn encode_utf16_be(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .flat_map(|unit| unit.to_be_bytes())
        .collect()
}
