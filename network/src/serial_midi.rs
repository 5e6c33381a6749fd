use async_trait::async_trait;
use tonex_core::ControllerError;

/// Baud rate for the pedal's TRS-MIDI UART input (`midi_serial.c`).
pub const MIDI_SERIAL_BAUD: u32 = 31_250;

/// Raw UART access seam for serial MIDI input (desktop-only per
/// §4.H's Non-goals — the ESP32 HAL uses `esp-idf-hal::uart` directly
/// instead of going through this trait).
#[async_trait]
pub trait UartPort: Send + Sync {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ControllerError>;
}

/// Scans a raw MIDI byte stream for Program Change messages on `channel`
/// (`Config::midi_channel`, §6 `MIDI_CHANNEL`), returning each decoded
/// preset number in order. Running status is not supported (each PC message
/// must carry its own `0xC0` status byte); real-time bytes (`0xF8..=0xFF`)
/// are skipped in place, and any other status byte causes its whole message
/// to be skipped by scanning to the next status byte — this is a
/// byte-for-byte port of the firmware's scan loop, not a general MIDI
/// parser.
pub fn scan_program_changes(buf: &[u8], channel: u8) -> Vec<u8> {
    let mut presets = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        let byte = buf[i];

        if byte >= 0xF8 {
            i += 1;
            continue;
        }

        if byte & 0xF0 == 0xC0 {
            let msg_channel = byte & 0x0F;
            if let Some(&program) = buf.get(i + 1) {
                if msg_channel == channel {
                    presets.push(program);
                }
                i += 2;
            } else {
                break;
            }
            continue;
        }

        if byte & 0x80 != 0 {
            i += 1;
            while i < buf.len() && buf[i] & 0x80 == 0 {
                i += 1;
            }
            continue;
        }

        i += 1;
    }
    presets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_program_change_on_target_channel() {
        let stream = [0xC2, 0x0A];
        assert_eq!(scan_program_changes(&stream, 2), vec![10]);
    }

    #[test]
    fn ignores_program_change_on_other_channels() {
        let stream = [0xC0, 0x05];
        assert!(scan_program_changes(&stream, 2).is_empty());
    }

    #[test]
    fn channel_is_configurable_at_call_time() {
        let stream = [0xC0, 0x05];
        assert_eq!(scan_program_changes(&stream, 0), vec![5]);
    }

    #[test]
    fn skips_real_time_bytes() {
        let stream = [0xF8, 0xFE, 0xC2, 0x03];
        assert_eq!(scan_program_changes(&stream, 2), vec![3]);
    }

    #[test]
    fn skips_unrelated_status_messages_to_next_status_byte() {
        // Note On (3 bytes) on channel 0, then PC on channel 2.
        let stream = [0x90, 0x40, 0x7F, 0xC2, 0x07];
        assert_eq!(scan_program_changes(&stream, 2), vec![7]);
    }

    #[test]
    fn truncated_program_change_at_buffer_end_is_dropped() {
        let stream = [0xC2];
        assert!(scan_program_changes(&stream, 2).is_empty());
    }
}
