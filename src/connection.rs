use crate::protocol::handshaking::inbound::HandshakePacket;
use crate::protocol::login::inbound::LoginStartPacket;
use crate::protocol::login::outbound::DisconnectPacket;
use crate::protocol::reader::FrameReader;
use crate::protocol::status::inbound::{PingPacket, StatusRequestPacket};
use crate::protocol::status::outbound::{PongPacket, StatusResponsePacket};
use crate::protocol::{
    Error, InboundPacket, LEGACY_PING_HEAD, MAX_FRAME_LENGTH, OutboundPacket, State, format_hex,
    legacy, read_exactly, read_frame_length, write_frame,
};
use crate::status::StatusPayloads;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use Phase::{Handshake, Login, Status, Transfer, Unknown};

/// The protocol phase a connection is currently in.
///
/// A connection only ever advances forward: it starts in [`Handshake`], branches into one of
/// the other phases through the handshake packet, and moves from [`Status`] to [`Unknown`]
/// once the status document has been sent. It never returns to [`Handshake`], which keeps a
/// single connection from requesting the status document more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    Status,
    Login,
    Transfer,
    Unknown,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Handshake => "Handshake",
            Status => "Status",
            Login => "Login",
            Transfer => "Transfer",
            Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<State> for Phase {
    fn from(state: State) -> Self {
        match state {
            State::Status => Status,
            State::Login => Login,
            State::Transfer => Transfer,
            State::Unknown => Unknown,
        }
    }
}

/// What the dispatcher decided about the connection after a frame was served.
enum Flow {
    /// Keep the connection open and read the next frame.
    Continue,
    /// The exchange is complete, close the connection.
    Close,
}

/// A single client connection being driven through the protocol.
pub struct Connection<S> {
    /// The underlying byte stream.
    stream: S,
    /// The precomputed response payloads shared by all connections.
    payloads: Arc<StatusPayloads>,
    /// The current phase of the connection.
    phase: Phase,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, payloads: Arc<StatusPayloads>) -> Self {
        Self {
            stream,
            payloads,
            phase: Handshake,
        }
    }

    /// Drives the connection until the exchange completes or fails.
    ///
    /// The first byte of every frame doubles as the dialect switch: `0xFE` hands the whole
    /// connection to the legacy (1.6) flow, anything else already is the first byte of the
    /// modern frame length and must not be re-read.
    pub async fn listen(&mut self) -> Result<(), Error> {
        loop {
            let head = read_exactly(&mut self.stream, 1).await?[0];

            if head == LEGACY_PING_HEAD {
                debug!("detected legacy (1.6) ping");
                return legacy::serve(&mut self.stream, &self.payloads.legacy_blob).await;
            }

            let length = read_frame_length(&mut self.stream, head).await?;
            if length == 0 || length > MAX_FRAME_LENGTH {
                return Err(Error::IllegalFrameLength { length });
            }

            let frame = read_exactly(&mut self.stream, length).await?;
            debug!(length, frame = %format_hex(&frame), "received frame");

            match self.handle_frame(&frame).await? {
                Flow::Continue => {}
                Flow::Close => return Ok(()),
            }
        }
    }

    /// Decodes one buffered frame and serves it according to the current phase.
    async fn handle_frame(&mut self, frame: &[u8]) -> Result<Flow, Error> {
        let reader = &mut FrameReader::new(frame);
        let packet_id = reader.read_u8()?;

        match (packet_id, self.phase) {
            (0x00, Handshake) => {
                let packet = HandshakePacket::decode(reader)?;
                debug!(
                    protocol_version = packet.protocol_version,
                    server_address = %packet.escaped_address(),
                    server_port = packet.server_port,
                    next_state = ?packet.next_state,
                    "received handshake packet"
                );

                self.phase = packet.next_state.into();
                Ok(Flow::Continue)
            }
            (0x00, Status) => {
                // the status request is empty, so the whole frame is just the packet id
                if frame.len() != 1 {
                    return Err(Error::UnexpectedFrame {
                        reason: "status request with a non-empty payload",
                    });
                }

                let packet = StatusRequestPacket::decode(reader)?;
                debug!(packet = ?packet, "received status request packet, sending status response");
                let response = StatusResponsePacket {
                    body: self.payloads.status_json.clone(),
                };
                write_frame(&mut self.stream, &response.encode()).await?;

                // a ping may still follow, but a second status request must not
                self.phase = Unknown;
                Ok(Flow::Continue)
            }
            (0x00, Login) => {
                let packet = LoginStartPacket::decode(reader)?;
                debug!(
                    user_name = %packet.user_name,
                    user_id = ?packet.user_id,
                    "received login start packet, sending maintenance kick"
                );

                let response = DisconnectPacket {
                    reason: self.payloads.kick_json.clone(),
                };
                write_frame(&mut self.stream, &response.encode()).await?;
                Ok(Flow::Close)
            }
            (0x00, Transfer | Unknown) => {
                debug!(phase = %self.phase, "dropping packet without a reply");
                Ok(Flow::Close)
            }
            (0x01, _) => {
                let packet = PingPacket::decode(reader)?;
                debug!(payload = packet.payload, "received ping packet, sending pong");

                let response = PongPacket::new(packet.payload);
                write_frame(&mut self.stream, &response.encode()).await?;
                Ok(Flow::Close)
            }
            (packet_id, phase) => {
                warn!(packet_id, phase = %phase, "unsupported packet in phase");
                Ok(Flow::Close)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::write_string;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    fn spawn_connection() -> (DuplexStream, JoinHandle<Result<(), Error>>, Arc<StatusPayloads>) {
        let config = Config {
            server_icon: "does-not-exist.png".to_string(),
            ..Config::default()
        };
        let payloads = Arc::new(StatusPayloads::build(&config).expect("build failed"));
        let (client, server) = tokio::io::duplex(4096);

        let task_payloads = Arc::clone(&payloads);
        let handle = tokio::spawn(async move {
            let mut connection = Connection::new(server, task_payloads);
            connection.listen().await
        });

        (client, handle, payloads)
    }

    fn encode_handshake(next_state: u8) -> Vec<u8> {
        let mut body = vec![HandshakePacket::ID, 0x00];
        write_string(&mut body, "localhost");
        body.extend_from_slice(&25_565u16.to_be_bytes());
        body.push(next_state);

        let mut frame = vec![body.len() as u8];
        frame.extend_from_slice(&body);
        frame
    }

    async fn read_client_varint(client: &mut DuplexStream) -> usize {
        let mut result = 0;
        for group in 0..5 {
            let byte = client.read_u8().await.expect("varint read failed");
            result |= ((byte & 0x7F) as usize) << (7 * group);
            if byte & 0x80 == 0 {
                break;
            }
        }
        result
    }

    async fn read_response_body(client: &mut DuplexStream, packet_id: u8) -> Vec<u8> {
        let length = read_client_varint(client).await;
        let mut frame = vec![0; length];
        client.read_exact(&mut frame).await.expect("frame read failed");
        assert_eq!(frame[0], packet_id, "mismatching packet id");
        frame[1..].to_vec()
    }

    #[tokio::test]
    async fn serves_status_and_ping() {
        let (mut client, handle, payloads) = spawn_connection();

        client
            .write_all(&encode_handshake(0x01))
            .await
            .expect("send handshake failed");
        client
            .write_all(&[0x01, 0x00])
            .await
            .expect("send status request failed");

        let body = read_response_body(&mut client, 0x00).await;
        let mut expected = Vec::new();
        write_string(&mut expected, &payloads.status_json);
        assert_eq!(body, expected);

        client
            .write_all(&[0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A])
            .await
            .expect("send ping failed");

        let mut pong = [0; 10];
        client.read_exact(&mut pong).await.expect("pong read failed");
        assert_eq!(
            pong,
            [0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A]
        );

        handle.await.expect("server run failed").expect("listen failed");
    }

    #[tokio::test]
    async fn refuses_a_second_status_request() {
        let (mut client, handle, _payloads) = spawn_connection();

        client
            .write_all(&encode_handshake(0x01))
            .await
            .expect("send handshake failed");
        client
            .write_all(&[0x01, 0x00])
            .await
            .expect("send status request failed");
        read_response_body(&mut client, 0x00).await;

        // the connection is now in the Unknown phase; the repeat is dropped without a reply
        client
            .write_all(&[0x01, 0x00])
            .await
            .expect("send repeat failed");

        handle.await.expect("server run failed").expect("listen failed");

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.expect("read failed");
        assert!(rest.is_empty(), "a second status request must not be answered");
    }

    #[tokio::test]
    async fn rejects_an_overlong_status_request() {
        let (mut client, handle, _payloads) = spawn_connection();

        client
            .write_all(&encode_handshake(0x01))
            .await
            .expect("send handshake failed");
        client
            .write_all(&[0x02, 0x00, 0x2A])
            .await
            .expect("send bad request failed");

        let result = handle.await.expect("server run failed");
        assert!(matches!(result, Err(Error::UnexpectedFrame { .. })));
    }

    #[tokio::test]
    async fn kicks_a_login_with_tagged_uuid() {
        let (mut client, handle, payloads) = spawn_connection();

        client
            .write_all(&encode_handshake(0x02))
            .await
            .expect("send handshake failed");

        let mut body = vec![LoginStartPacket::ID];
        write_string(&mut body, "Alice");
        body.push(0x01);
        body.extend_from_slice(uuid::Uuid::nil().as_bytes());
        let mut frame = vec![body.len() as u8];
        frame.extend_from_slice(&body);
        client.write_all(&frame).await.expect("send login failed");

        let response = read_response_body(&mut client, 0x00).await;
        let mut expected = Vec::new();
        write_string(&mut expected, &payloads.kick_json);
        assert_eq!(response, expected);

        handle.await.expect("server run failed").expect("listen failed");
    }

    #[tokio::test]
    async fn kicks_a_login_without_profile_bytes() {
        let (mut client, handle, payloads) = spawn_connection();

        client
            .write_all(&encode_handshake(0x02))
            .await
            .expect("send handshake failed");

        let mut body = vec![LoginStartPacket::ID];
        write_string(&mut body, "Alice");
        let mut frame = vec![body.len() as u8];
        frame.extend_from_slice(&body);
        client.write_all(&frame).await.expect("send login failed");

        let response = read_response_body(&mut client, 0x00).await;
        let mut expected = Vec::new();
        write_string(&mut expected, &payloads.kick_json);
        assert_eq!(response, expected);

        handle.await.expect("server run failed").expect("listen failed");
    }

    #[tokio::test]
    async fn drops_a_transfer_without_reply() {
        let (mut client, handle, _payloads) = spawn_connection();

        client
            .write_all(&encode_handshake(0x03))
            .await
            .expect("send handshake failed");
        client
            .write_all(&[0x01, 0x00])
            .await
            .expect("send follow-up failed");

        handle.await.expect("server run failed").expect("listen failed");

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.expect("read failed");
        assert!(rest.is_empty(), "transfer requests must be dropped silently");
    }

    #[tokio::test]
    async fn serves_a_legacy_ping() {
        let (mut client, handle, payloads) = spawn_connection();

        let mut request = vec![0xFE, 0x01, 0xFA, 0x00, 0x0B];
        request.extend_from_slice(&crate::protocol::legacy::encode_utf16_be("MC|PingHost"));
        let host = crate::protocol::legacy::encode_utf16_be("localhost");
        request.extend_from_slice(&(7 + host.len() as u16).to_be_bytes());
        request.push(0x49);
        request.extend_from_slice(&9u16.to_be_bytes());
        request.extend_from_slice(&host);
        request.extend_from_slice(&25_565i32.to_be_bytes());
        client.write_all(&request).await.expect("send ping failed");

        let mut reply = vec![0; payloads.legacy_blob.len()];
        client.read_exact(&mut reply).await.expect("read failed");
        assert_eq!(reply, payloads.legacy_blob);

        handle.await.expect("server run failed").expect("listen failed");
    }

    #[tokio::test]
    async fn rejects_a_zero_length_frame() {
        let (mut client, handle, _payloads) = spawn_connection();

        client.write_all(&[0x00]).await.expect("send failed");

        let result = handle.await.expect("server run failed");
        assert!(matches!(result, Err(Error::IllegalFrameLength { length: 0 })));
    }

    #[tokio::test]
    async fn rejects_an_endless_varint_length() {
        let (mut client, handle, _payloads) = spawn_connection();

        client
            .write_all(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
            .await
            .expect("send failed");

        let result = handle.await.expect("server run failed");
        assert!(matches!(result, Err(Error::VarIntTooLong)));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_an_idle_connection() {
        let (_client, handle, _payloads) = spawn_connection();

        let result = handle.await.expect("server run failed");
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn reports_an_early_disconnect() {
        let (client, handle, _payloads) = spawn_connection();
        drop(client);

        let result = handle.await.expect("server run failed");
        assert!(matches!(result, Err(Error::ConnectionClosed(_))));
    }
}
