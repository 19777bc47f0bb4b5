use crate::protocol::reader::FrameReader;
use crate::protocol::{Error, InboundPacket, OutboundPacket, write_string};

pub mod outbound {
    use super::*;

    /// The outbound [`StatusResponsePacket`].
    ///
    /// This packet is sent only after a [`StatusRequestPacket`](super::inbound::StatusRequestPacket)
    /// and does not close the connection, allowing for a ping sequence to be exchanged afterward.
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Status_Response)
    #[derive(Debug, Clone, Eq, PartialEq)]
    pub struct StatusResponsePacket {
        /// The JSON response body that contains all self-reported server metadata.
        pub body: String,
    }

    impl OutboundPacket for StatusResponsePacket {
        const ID: u8 = 0x00;

        fn encode_body(&self, buffer: &mut Vec<u8>) {
            write_string(buffer, &self.body);
        }
    }

    /// This is the response to a specific [`PingPacket`](super::inbound::PingPacket) that can be
    /// used to measure the server ping.
    ///
    /// The packet carries the same payload as the request. Sending it consumes the connection,
    /// ending the Server List Ping sequence.
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Pong_Response_(status))
    #[derive(Debug, Clone, Eq, PartialEq)]
    pub struct PongPacket {
        /// The arbitrary payload that was sent from the client (to identify the corresponding response).
        pub payload: i64,
    }

    impl PongPacket {
        /// Creates a new [`PongPacket`] with the supplied payload.
        pub const fn new(payload: i64) -> Self {
            Self { payload }
        }
    }

    impl OutboundPacket for PongPacket {
        const ID: u8 = 0x01;

        fn encode_body(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(&self.payload.to_be_bytes());
        }
    }
}

pub mod inbound {
    use super::*;

    /// The inbound [`StatusRequestPacket`].
    ///
    /// The status can only be requested once immediately after the handshake, before any ping.
    /// The server won't respond otherwise. The packet has no payload; the connection handler
    /// verifies that the frame carried nothing beyond the packet ID.
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Status_Request)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StatusRequestPacket;

    impl InboundPacket for StatusRequestPacket {
        const ID: u8 = 0x00;

        fn decode(_reader: &mut FrameReader<'_>) -> Result<Self, Error> {
            Ok(Self)
        }
    }

    /// The inbound [`PingPacket`].
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Ping_Request_(status))
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PingPacket {
        /// The arbitrary payload that will be returned from the server (to identify the corresponding request).
        pub payload: i64,
    }

    impl InboundPacket for PingPacket {
        const ID: u8 = 0x01;

        fn decode(reader: &mut FrameReader<'_>) -> Result<Self, Error> {
            let payload = reader.read_i64()?;

            Ok(Self { payload })
        }
    }
}
