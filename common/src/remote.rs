//! Decoder for captures of the fireplace's 433 MHz handheld remote.
//!
//! A capture is a list of signed pulse durations in microseconds: positive
//! values are carrier-high, negative values are gaps. The leading sync pulse
//! carries no data and a gap longer than 4.8 ms ends the frame.

use thiserror::Error;

use crate::{command::FireplaceCommand, types::PowerLevel};

const BIT_PERIOD_US: f32 = 413.0;
const FRAME_GAP_US: i32 = -4_800;
const PREAMBLE_BITS: usize = 116;
const FRAME_BYTES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCode {
    Off,
    Level(PowerLevel),
}

impl RemoteCode {
    pub fn command(self) -> FireplaceCommand {
        match self {
            Self::Off => FireplaceCommand::TurnOff,
            Self::Level(level) => FireplaceCommand::TurnOn { power: Some(level) },
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteDecodeError {
    #[error("capture ended before a full frame was read")]
    Truncated,
    #[error("unrecognised frame {0:02x}{1:02x}{2:02x}")]
    UnknownFrame(u8, u8, u8),
}

pub fn decode(transmission: &[i32]) -> Result<RemoteCode, RemoteDecodeError> {
    let frame = read_frame(transmission)?;
    classify(frame)
}

/// Parses a comma or whitespace separated capture such as `"413,-826,413"`.
pub fn parse_capture(payload: &str) -> Option<Vec<i32>> {
    payload
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i32>().ok())
        .collect()
}

fn read_frame(transmission: &[i32]) -> Result<[u8; FRAME_BYTES], RemoteDecodeError> {
    let mut found = false;
    let mut counter = 0usize;
    let mut data = [0u8; FRAME_BYTES];
    let mut data_len = 0usize;
    let mut block = 0u8;
    let mut block_bits = 0u8;

    for &duration in transmission {
        // Skip the sync pulse, stop at the inter-frame gap.
        if duration > FRAME_GAP_US && !found {
            found = true;
            continue;
        } else if duration < FRAME_GAP_US {
            break;
        }

        let bits = (duration as f32 / BIT_PERIOD_US).round() as i32;
        for _ in 0..bits.unsigned_abs() {
            counter += 1;
            if counter <= PREAMBLE_BITS {
                continue;
            }

            let position = 7 - block_bits;
            block_bits += 1;
            if bits > 0 {
                block |= 1 << position;
            }

            if position == 0 {
                data[data_len] = block;
                data_len += 1;
                block = 0;
                block_bits = 0;
                if data_len == FRAME_BYTES {
                    return Ok(data);
                }
            }
        }
    }

    Err(RemoteDecodeError::Truncated)
}

fn classify(frame: [u8; FRAME_BYTES]) -> Result<RemoteCode, RemoteDecodeError> {
    let [first, second, third] = frame;
    if third & 0x0F == 0x0A {
        return Ok(RemoteCode::Off);
    }

    let code = match first {
        0xB3 => RemoteCode::Level(1),
        0xCB => RemoteCode::Level(2),
        0xD2 => RemoteCode::Level(3),
        0x95 => RemoteCode::Level(4),
        0x32 => RemoteCode::Level(5),
        0xA5 => RemoteCode::Level(6),
        _ if third & 0x0F == 0x04 => RemoteCode::Level(6),
        _ => return Err(RemoteDecodeError::UnknownFrame(first, second, third)),
    };
    Ok(code)
}
