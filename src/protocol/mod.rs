//! This module defines and handles the two Minecraft protocol dialects spoken by clients
//! probing a server address.
//!
//! Both dialects arrive on the same TCP port and are told apart by the very first byte of the
//! connection: `0xFE` opens the [legacy (1.6) ping][legacy], anything else is the first byte of
//! the frame length of the modern (1.7+) protocol. We only care about the packets of the
//! [Handshaking][handshaking], [Status][status] and [Login][login] phases and therefore only
//! implement that part of the Minecraft protocol. The implementations may differ from the
//! official Minecraft client implementation if the observed outcome is the same and the result
//! is reliable.
//!
//! [handshaking]: https://minecraft.wiki/w/Java_Edition_protocol#Handshaking
//! [status]: https://minecraft.wiki/w/Java_Edition_protocol#Status
//! [login]: https://minecraft.wiki/w/Java_Edition_protocol#Login
//! [legacy]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Server_List_Ping#1.6

use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

pub mod handshaking;
pub mod legacy;
pub mod login;
pub mod reader;
pub mod status;

use reader::FrameReader;

pub type VarInt = i32;

/// The deadline for any single socket read. Clients that stall longer are disconnected.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// The max frame length in bytes. Larger frames are rejected as malformed.
pub const MAX_FRAME_LENGTH: usize = 32 * 1024;

/// The sentinel first byte that switches the connection to the legacy (1.6) dialect.
pub const LEGACY_PING_HEAD: u8 = 0xFE;

const INITIAL_BUFFER_SIZE: usize = 48;

/// The internal error type for all errors related to the protocol communication.
///
/// This includes errors with the expected frames, frame contents or encoding of the exchanged
/// fields. Errors of the underlying data layer (for byte exchange) are wrapped from the
/// underlying IO errors. Additionally, the internal read deadline is also covered as an error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error occurred while reading or writing to the underlying byte stream.
    #[error("error reading or writing data: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection while more data was still expected.
    #[error("connection closed by peer: {0}")]
    ConnectionClosed(std::io::Error),

    /// A single socket read did not complete within [`READ_TIMEOUT`].
    #[error("read deadline exceeded")]
    Timeout,

    /// The received frame declared a length that we cannot process.
    #[error("illegal frame length: {length}")]
    IllegalFrameLength {
        /// The length the frame declared for itself.
        length: usize,
    },

    /// A read requested more bytes than the frame still holds.
    #[error("insufficient data: needed {needed} with {remaining} remaining")]
    InsufficientData {
        /// The number of bytes the read required.
        needed: usize,
        /// The number of bytes left in the frame.
        remaining: usize,
    },

    /// A `VarInt` continued past the five bytes a 32-bit value may occupy.
    #[error("VarInt data exceeds five bytes")]
    VarIntTooLong,

    /// A rewind reached back past the beginning of the frame.
    #[error("unread of {requested} bytes exceeds cursor position {position}")]
    UnreadOutOfRange {
        /// The number of bytes the rewind asked for.
        requested: usize,
        /// The cursor position at the time of the rewind.
        position: usize,
    },

    /// A string field was not valid UTF-8 (or UTF-16-BE in the legacy dialect).
    #[error("invalid string encoding")]
    InvalidEncoding,

    /// The received bytes do not match the protocol in the current state.
    #[error("unexpected frame: {reason}")]
    UnexpectedFrame {
        /// A short description of the mismatch.
        reason: &'static str,
    },

    /// A response payload could not be JSON-encoded.
    #[error("invalid struct for JSON (encoding problem)")]
    EncodingFail(#[from] serde_json::Error),
}

impl Error {
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed(_))
    }
}

fn map_io(err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => Error::ConnectionClosed(err),
        _ => Error::Io(err),
    }
}

/// State is the desired state that the connection should be in after the initial handshake.
///
/// Unlike the official protocol we never reject an unknown state index: anything outside the
/// documented range maps to [`State::Unknown`] and the connection is dropped without a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Query the server information without connecting.
    Status,
    /// Log into the Minecraft server, establishing a connection.
    Login,
    /// Log into the Minecraft server after a transfer from another server.
    Transfer,
    /// Any state index this implementation does not serve.
    Unknown,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0x01 => State::Status,
            0x02 => State::Login,
            0x03 => State::Transfer,
            _ => State::Unknown,
        }
    }
}

/// `InboundPacket`s are packets that are received and decoded from a buffered frame.
pub(crate) trait InboundPacket: Sized {
    /// The defined ID of this network packet.
    const ID: u8;

    /// Creates a new instance of this packet with the data from the frame reader.
    fn decode(reader: &mut FrameReader<'_>) -> Result<Self, Error>;
}

/// `OutboundPacket`s are packets that are written from the serverside.
///
/// [`OutboundPacket::encode`] produces the complete frame, length prefix included, so a single
/// write puts the whole response on the wire.
pub(crate) trait OutboundPacket {
    /// The defined ID of this network packet.
    const ID: u8;

    /// Writes the packet fields (everything after the packet ID) into the buffer.
    fn encode_body(&self, buffer: &mut Vec<u8>);

    /// Encodes the full frame as described in the official [protocol documentation][protocol-doc].
    ///
    /// [protocol-doc]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Protocol#Packet_format
    fn encode(&self) -> Vec<u8> {
        let mut inner = Vec::with_capacity(INITIAL_BUFFER_SIZE);
        inner.push(Self::ID);
        self.encode_body(&mut inner);

        // write the length of the content (length frame encoder) and then the packet
        let mut frame = Vec::with_capacity(inner.len() + 5);
        write_varint(&mut frame, inner.len() as VarInt);
        frame.extend_from_slice(&inner);
        frame
    }
}

/// Appends a `VarInt` to the buffer as described in the official
/// [protocol documentation][protocol-doc].
///
/// [protocol-doc]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Protocol#VarInt_and_VarLong
pub fn write_varint(buffer: &mut Vec<u8>, value: VarInt) {
    let mut value = value as u32;
    loop {
        let part = (value & 0b0111_1111) as u8;
        value >>= 7;
        if value != 0 {
            buffer.push(part | 0b1000_0000);
        } else {
            buffer.push(part);
            break;
        }
    }
}

/// Appends a `VarInt`-length-prefixed UTF-8 string to the buffer as described in the official
/// [protocol documentation][protocol-doc].
///
/// [protocol-doc]: https://minecraft.wiki/w/Minecraft_Wiki:Projects/wiki.vg_merge/Protocol#Type:String
pub fn write_string(buffer: &mut Vec<u8>, value: &str) {
    write_varint(buffer, value.len() as VarInt);
    buffer.extend_from_slice(value.as_bytes());
}

/// Reads exactly `count` bytes from the stream, honoring the per-read deadline.
///
/// A short read that ends with the peer closing the stream fails with
/// [`Error::ConnectionClosed`], a read that stalls past [`READ_TIMEOUT`] fails with
/// [`Error::Timeout`].
pub(crate) async fn read_exactly<S>(stream: &mut S, count: usize) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = vec![0; count];
    match timeout(READ_TIMEOUT, stream.read_exact(&mut buffer)).await {
        Ok(Ok(_)) => Ok(buffer),
        Ok(Err(err)) => Err(map_io(err)),
        Err(_) => Err(Error::Timeout),
    }
}

/// Completes the `VarInt` frame length whose first byte has already been consumed by the
/// dialect demultiplexer.
///
/// The first byte may well carry the continuation bit; in that case the remaining groups are
/// read directly from the socket, one byte at a time, without any rewinding.
pub(crate) async fn read_frame_length<S>(stream: &mut S, first: u8) -> Result<usize, Error>
where
    S: AsyncRead + Unpin,
{
    let mut result = (first & 0b0111_1111) as u32;
    if first & 0b1000_0000 != 0 {
        let mut group = 1;
        loop {
            if group >= 5 {
                return Err(Error::VarIntTooLong);
            }

            let byte = read_exactly(stream, 1).await?[0];
            result |= ((byte & 0b0111_1111) as u32) << (7 * group);
            if byte & 0b1000_0000 == 0 {
                break;
            }
            group += 1;
        }
    }

    Ok(result as usize)
}

/// Writes a complete, pre-encoded frame onto the stream in a single send.
pub(crate) async fn write_frame<S>(stream: &mut S, frame: &[u8]) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(frame).await.map_err(map_io)?;
    stream.flush().await.map_err(map_io)?;

    Ok(())
}

/// Formats bytes as spaced, uppercase hex for the wire-level debug logs.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
