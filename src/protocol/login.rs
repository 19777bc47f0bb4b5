use crate::protocol::reader::FrameReader;
use crate::protocol::{Error, InboundPacket, OutboundPacket, write_string};
use uuid::Uuid;

pub mod outbound {
    use super::*;

    /// The outbound [`DisconnectPacket`].
    ///
    /// The reason is a JSON text component. Sending this packet is the polite refusal that ends
    /// every login attempt against a server under maintenance.
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Disconnect_(login))
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DisconnectPacket {
        /// The JSON text component containing the reason of the disconnect.
        pub reason: String,
    }

    impl OutboundPacket for DisconnectPacket {
        const ID: u8 = 0x00;

        fn encode_body(&self, buffer: &mut Vec<u8>) {
            write_string(buffer, &self.reason);
        }
    }
}

pub mod inbound {
    use super::*;

    /// The inbound [`LoginStartPacket`].
    ///
    /// The tail after the player name differs between client generations and is parsed
    /// tolerantly. Three shapes are observed in the wild: nothing at all, a one-byte profile
    /// tag (`0x01` followed by a UUID, `0x00` followed by nothing), or a bare UUID with no tag.
    /// The discrimination needs a one-byte lookahead and a rewind; no field is validated
    /// against an expected value.
    ///
    /// [Minecraft Docs](https://minecraft.wiki/w/Java_Edition_protocol#Login_Start)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LoginStartPacket {
        /// The visual name of the joining player.
        pub user_name: String,
        /// The unique identifier of the joining player, when the client sent one.
        pub user_id: Option<Uuid>,
    }

    impl LoginStartPacket {
        fn decode_tail(reader: &mut FrameReader<'_>) -> Result<Option<Uuid>, Error> {
            // an exhausted frame simply has no tail
            let Ok(tag) = reader.read_u8() else {
                return Ok(None);
            };

            match tag {
                0x00 => Ok(None),
                0x01 if reader.remaining() >= 16 => Ok(Some(reader.read_uuid()?)),
                _ => {
                    // not a profile tag after all: rewind and probe for a bare UUID
                    reader.unread(1)?;
                    if reader.remaining() >= 16 {
                        Ok(Some(reader.read_uuid()?))
                    } else {
                        Ok(None)
                    }
                }
            }
        }
    }

    impl InboundPacket for LoginStartPacket {
        const ID: u8 = 0x00;

        fn decode(reader: &mut FrameReader<'_>) -> Result<Self, Error> {
            let user_name = reader.read_string()?;
            let user_id = Self::decode_tail(reader)?;

            Ok(Self { user_name, user_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::inbound::LoginStartPacket;
    use super::*;
    use uuid::uuid;

    const ALICE_ID: Uuid = uuid!("09879557-e479-45a9-b434-a56377674627");

    fn encode_name(name: &str) -> Vec<u8> {
        let mut body = Vec::new();
        write_string(&mut body, name);
        body
    }

    #[test]
    fn decodes_a_tagged_uuid() {
        let mut body = encode_name("Alice");
        body.push(0x01);
        body.extend_from_slice(ALICE_ID.as_bytes());

        let mut reader = FrameReader::new(&body);
        let packet = LoginStartPacket::decode(&mut reader).expect("decode failed");
        assert_eq!(packet.user_name, "Alice");
        assert_eq!(packet.user_id, Some(ALICE_ID));
    }

    #[test]
    fn decodes_a_cleared_tag_without_uuid() {
        let mut body = encode_name("Alice");
        body.push(0x00);

        let mut reader = FrameReader::new(&body);
        let packet = LoginStartPacket::decode(&mut reader).expect("decode failed");
        assert_eq!(packet.user_id, None);
    }

    #[test]
    fn decodes_a_bare_name() {
        let body = encode_name("Alice");

        let mut reader = FrameReader::new(&body);
        let packet = LoginStartPacket::decode(&mut reader).expect("decode failed");
        assert_eq!(packet.user_name, "Alice");
        assert_eq!(packet.user_id, None);
    }

    #[test]
    fn decodes_a_bare_uuid_without_tag() {
        // the first UUID byte is not 0x00/0x01, so the lookahead byte gets rewound
        let mut body = encode_name("Alice");
        body.extend_from_slice(ALICE_ID.as_bytes());

        let mut reader = FrameReader::new(&body);
        let packet = LoginStartPacket::decode(&mut reader).expect("decode failed");
        assert_eq!(packet.user_id, Some(ALICE_ID));
    }

    #[test]
    fn tolerates_a_tag_with_a_truncated_uuid() {
        let mut body = encode_name("Alice");
        body.push(0x01);
        body.extend_from_slice(&ALICE_ID.as_bytes()[..8]);

        let mut reader = FrameReader::new(&body);
        let packet = LoginStartPacket::decode(&mut reader).expect("decode failed");
        assert_eq!(packet.user_id, None);
    }

    #[test]
    fn disconnect_frames_the_reason() {
        let frame = outbound::DisconnectPacket {
            reason: r#"{"text":"no"}"#.to_string(),
        }
        .encode();

        let mut expected = vec![0x0F, 0x00, 0x0D];
        expected.extend_from_slice(br#"{"text":"no"}"#);
        assert_eq!(frame, expected);
    }
}
