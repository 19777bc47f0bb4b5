use crate::protocol::reader::FrameReader;
use crate::protocol::{Error, InboundPacket, State, VarInt};

pub mod inbound {
    use super::*;

    /// The inbound [`HandshakePacket`].
    ///
    /// This packet causes the server to switch into the target state. It is the very first
    /// modern packet on a connection and selects whether a status request or a login attempt
    /// follows.
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Handshake)
    #[derive(Debug, Clone, Eq, PartialEq)]
    pub struct HandshakePacket {
        /// The self-reported protocol version of the client.
        pub protocol_version: VarInt,
        /// The server address the client used to connect.
        pub server_address: String,
        /// The server port the client used to connect.
        pub server_port: u16,
        /// The protocol state to initiate.
        pub next_state: State,
    }

    impl HandshakePacket {
        /// Returns the client-sent server address with control characters rendered as
        /// two-character escapes, safe for a single log line.
        pub fn escaped_address(&self) -> String {
            self.server_address
                .replace('\0', "\\0")
                .replace('\r', "\\r")
                .replace('\t', "\\t")
                .replace('\n', "\\n")
        }
    }

    impl InboundPacket for HandshakePacket {
        const ID: u8 = 0x00;

        fn decode(reader: &mut FrameReader<'_>) -> Result<Self, Error> {
            let protocol_version = reader.read_varint()?;
            let server_address = reader.read_string()?;
            let server_port = reader.read_u16()?;
            let next_state = reader.read_u8()?.into();

            Ok(Self {
                protocol_version,
                server_address,
                server_port,
                next_state,
            })
        }
    }
}
