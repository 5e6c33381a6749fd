use anyhow::{anyhow, Result};
use bytes::{Buf, Bytes};

/// A decoded MIDI channel-voice or system message. Shared by the serial-MIDI
/// and BLE-MIDI ingest paths in `tonex-protocol` so both sit on one parser.
#[derive(Debug, Clone, PartialEq)]
pub enum MidiCommand {
    NoteOff { channel: u8, key: u8, velocity: u8 },
    NoteOn { channel: u8, key: u8, velocity: u8 },
    PolyphonicKeyPressure { channel: u8, key: u8, value: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, value: u8 },
    PitchBendChange { channel: u8, value: u16 },
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    TuneRequest,
    SystemExclusive(Vec<u8>),
    Unknown { status: u8, data: Vec<u8> },
}

/// Parses one complete MIDI message from the front of `data`, returning the
/// command and how many bytes it consumed. Running status is not supported:
/// every message must carry its own status byte, matching how both ingest
/// paths receive already-framed single messages rather than a raw wire
/// stream.
pub fn parse_midi_message(data: &[u8]) -> Result<(MidiCommand, usize)> {
    if data.is_empty() {
        return Err(anyhow!("empty MIDI data"));
    }
    let mut reader = Bytes::copy_from_slice(data);
    let status_byte = reader.chunk()[0];
    if status_byte < 0x80 {
        return Err(anyhow!("running status not supported"));
    }
    let command_length = midi_command_length(status_byte)?;
    if reader.len() < command_length {
        return Err(anyhow!(
            "incomplete MIDI message: expected {} bytes, got {}",
            command_length,
            reader.len()
        ));
    }
    let command_slice = reader.copy_to_bytes(command_length);
    let mut command_reader = command_slice;
    let command = MidiCommand::parse(&mut command_reader)?;
    Ok((command, command_length))
}

pub fn midi_command_length(status_byte: u8) -> Result<usize> {
    match status_byte & 0xF0 {
        0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => Ok(3),
        0xC0 | 0xD0 => Ok(2),
        0xF0 => match status_byte {
            0xF0 => Ok(1),
            0xF1 => Ok(2),
            0xF2 => Ok(3),
            0xF3 => Ok(2),
            0xF6 | 0xF8 | 0xFA | 0xFB | 0xFC | 0xFE | 0xFF => Ok(1),
            _ => Err(anyhow!(
                "unknown system common/real-time message: 0x{:X}",
                status_byte
            )),
        },
        _ => Err(anyhow!("unknown MIDI status byte: 0x{:X}", status_byte)),
    }
}

impl MidiCommand {
    pub fn parse(data: &mut Bytes) -> Result<Self> {
        if data.is_empty() {
            return Err(anyhow!("empty MIDI data"));
        }
        let status_byte = data.get_u8();
        match status_byte & 0xF0 {
            0x80 => Ok(MidiCommand::NoteOff {
                channel: status_byte & 0x0F,
                key: data.get_u8(),
                velocity: data.get_u8(),
            }),
            0x90 => Ok(MidiCommand::NoteOn {
                channel: status_byte & 0x0F,
                key: data.get_u8(),
                velocity: data.get_u8(),
            }),
            0xA0 => Ok(MidiCommand::PolyphonicKeyPressure {
                channel: status_byte & 0x0F,
                key: data.get_u8(),
                value: data.get_u8(),
            }),
            0xB0 => Ok(MidiCommand::ControlChange {
                channel: status_byte & 0x0F,
                control: data.get_u8(),
                value: data.get_u8(),
            }),
            0xC0 => Ok(MidiCommand::ProgramChange {
                channel: status_byte & 0x0F,
                program: data.get_u8(),
            }),
            0xD0 => Ok(MidiCommand::ChannelPressure {
                channel: status_byte & 0x0F,
                value: data.get_u8(),
            }),
            0xE0 => {
                let lsb = data.get_u8();
                let msb = data.get_u8();
                Ok(MidiCommand::PitchBendChange {
                    channel: status_byte & 0x0F,
                    value: ((msb as u16) << 7) | (lsb as u16),
                })
            }
            0xF0 => match status_byte {
                0xF0 => {
                    let mut sysex = Vec::new();
                    while data.has_remaining() {
                        let b = data.get_u8();
                        sysex.push(b);
                        if b == 0xF7 {
                            break;
                        }
                    }
                    Ok(MidiCommand::SystemExclusive(sysex))
                }
                0xF6 => Ok(MidiCommand::TuneRequest),
                0xF8 => Ok(MidiCommand::TimingClock),
                0xFA => Ok(MidiCommand::Start),
                0xFB => Ok(MidiCommand::Continue),
                0xFC => Ok(MidiCommand::Stop),
                0xFE => Ok(MidiCommand::ActiveSensing),
                _ => Ok(MidiCommand::Unknown {
                    status: status_byte,
                    data: data.to_vec(),
                }),
            },
            _ => Ok(MidiCommand::Unknown {
                status: status_byte,
                data: data.to_vec(),
            }),
        }
    }
}
