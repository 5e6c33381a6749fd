use tonex_core::{ControllerError, PresetBlob, StateBlob};

/// Message kind carried by a parsed header (§4.B). `Unknown` messages still
/// parse successfully — the pedal protocol has structures the controller
/// does not need to act on, and skipping them must not be treated as an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    StateUpdate,
    StatePresetDetails,
    Unknown(u16),
}

#[derive(Debug, Clone)]
pub struct Header {
    pub message_type: MessageType,
    pub size: u16,
}

/// Fully parsed pedal response (§4.B `ParsedMessage`).
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    Hello,
    StateUpdate(StateBlob),
    PresetDetails { preset_name: String, blob: PresetBlob },
    Unknown(u16),
}

/// Reads one tagged value from `body` at `*index`, advancing `index` past
/// it. `0x80` introduces a 1-byte value, `0x81`/`0x82` a 2-byte
/// little-endian value, anything else is itself the value (transcribed from
/// `usb_tonex_one_parse_value`).
fn parse_tagged_value(body: &[u8], index: &mut usize) -> Result<u16, ControllerError> {
    let tag = *body.get(*index).ok_or(ControllerError::InvalidFrame)?;
    match tag {
        0x81 | 0x82 => {
            let lo = *body.get(*index + 1).ok_or(ControllerError::InvalidFrame)?;
            let hi = *body.get(*index + 2).ok_or(ControllerError::InvalidFrame)?;
            *index += 3;
            Ok(((hi as u16) << 8) | lo as u16)
        }
        0x80 => {
            let value = *body.get(*index + 1).ok_or(ControllerError::InvalidFrame)?;
            *index += 2;
            Ok(value as u16)
        }
        other => {
            *index += 1;
            Ok(other as u16)
        }
    }
}

/// Parses one already-deframed pedal response. `body` is the CRC-stripped
/// payload handed back by [`crate::frame_codec::decode`].
pub fn parse_message(body: &[u8]) -> Result<ParsedMessage, ControllerError> {
    if body.len() < 5 || body[0] != 0xB9 || body[1] != 0x03 {
        return Err(ControllerError::InvalidFrame);
    }

    let mut index = 2;
    let type_tag = parse_tagged_value(body, &mut index)?;
    let message_type = match type_tag {
        0x0306 => MessageType::StateUpdate,
        0x0304 => MessageType::StatePresetDetails,
        0x02 => MessageType::Hello,
        other => MessageType::Unknown(other),
    };
    let size = parse_tagged_value(body, &mut index)?;
    let _unknown = parse_tagged_value(body, &mut index)?;

    let header = Header { message_type, size };
    if (body.len() - index) as u16 != header.size {
        return Err(ControllerError::InvalidFrame);
    }

    match header.message_type {
        MessageType::Hello => Ok(ParsedMessage::Hello),
        MessageType::StateUpdate => Ok(ParsedMessage::StateUpdate(StateBlob::new(body.to_vec()))),
        MessageType::StatePresetDetails => {
            let blob = PresetBlob::new(body.to_vec());
            let preset_name = blob.preset_name().unwrap_or_default();
            Ok(ParsedMessage::PresetDetails { preset_name, blob })
        }
        MessageType::Unknown(tag) => Ok(ParsedMessage::Unknown(tag)),
    }
}

/// Locates the next `0x7E`-terminated frame in `buf` starting at `from`,
/// returning its end index (exclusive) if found. Lets the USB read loop
/// split a buffer that arrived with more than one frame concatenated back
/// to back.
pub fn find_frame_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.iter().skip(from + 1).position(|&b| b == 0x7E).map(|offset| from + 1 + offset + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_codec;

    fn build_state_update_body() -> Vec<u8> {
        let mut body = vec![0xB9, 0x03, 0x81, 0x06, 0x03]; // type tag 0x0306
        let payload_tail = vec![0xAA; 30];
        body.push(0x80);
        body.push(payload_tail.len() as u8); // size
        body.push(0x00); // unknown
        body.extend_from_slice(&payload_tail);
        body
    }

    #[test]
    fn parses_state_update_header() {
        let body = build_state_update_body();
        let parsed = parse_message(&body).unwrap();
        assert!(matches!(parsed, ParsedMessage::StateUpdate(_)));
    }

    #[test]
    fn rejects_short_or_malformed_header() {
        assert!(matches!(parse_message(&[0xB9]), Err(ControllerError::InvalidFrame)));
        assert!(matches!(
            parse_message(&[0x00, 0x00, 0, 0, 0]),
            Err(ControllerError::InvalidFrame)
        ));
    }

    #[test]
    fn extracts_preset_name_from_preset_details_message() {
        let mut body = vec![0xB9, 0x03, 0x02 /* TYPE_HELLO tag unused here */];
        // Rebuild with the preset-details type tag (0x0304) instead.
        body = vec![0xB9, 0x03, 0x81, 0x04, 0x03];
        let mut tail = Vec::new();
        tail.extend_from_slice(&tonex_core::preset_blob::PRESET_NAME_MARKER);
        let mut name_field = vec![0u8; 32];
        name_field[..8].copy_from_slice(b"LeadTone");
        tail.extend_from_slice(&name_field);
        body.push(0x80);
        body.push(tail.len() as u8);
        body.push(0x00);
        body.extend_from_slice(&tail);

        let parsed = parse_message(&body).unwrap();
        match parsed {
            ParsedMessage::PresetDetails { preset_name, .. } => {
                assert_eq!(preset_name, "LeadTone");
            }
            other => panic!("expected PresetDetails, got {other:?}"),
        }
    }

    #[test]
    fn finds_frame_boundary_in_concatenated_buffer() {
        let a = frame_codec::encode(&[1, 2, 3]);
        let b = frame_codec::encode(&[4, 5]);
        let mut combined = a.clone();
        combined.extend_from_slice(&b);
        let end = find_frame_end(&combined, 0).unwrap();
        assert_eq!(end, a.len());
    }
}
