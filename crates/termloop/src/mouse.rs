//! Mouse reporting protocols.
//!
//! Terminals report pointer activity in one of three escape-sequence
//! dialects. All three share the xterm button encoding and differ only in
//! how the numbers travel on the wire:
//!
//! | Protocol | Wire form | Notes |
//! |---|---|---|
//! | SGR (1006) | `ESC [ < b ; x ; y M` or `... m` | decimal, release via final `m` |
//! | X10 (1000) | `ESC [ M b x y` | three raw bytes offset by 32 |
//! | URxvt (1015) | `ESC [ b ; x ; y M` | decimal, button offset by 32 |
//!
//! Coordinates on the wire are 1-based; [`MouseEvent`] positions are 0-based.

use thiserror::Error;

use crate::event::{KeyModifiers, MouseAction, MouseButton, MouseEvent};

/// Length of an X10 report, introducer included.
pub const X10_SEQUENCE_LEN: usize = 6;

const BIT_SHIFT: u16 = 0b0000_0100;
const BIT_ALT: u16 = 0b0000_1000;
const BIT_CTRL: u16 = 0b0001_0000;
const BIT_MOTION: u16 = 0b0010_0000;
const BIT_WHEEL: u16 = 0b0100_0000;
const BIT_EXTRA: u16 = 0b1000_0000;
const BUTTON_MASK: u16 = 0b0000_0011;

/// Which dialect a report was encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseProtocol {
    Sgr,
    X10,
    Urxvt,
}

/// Why a mouse report could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseParseError {
    #[error("unsupported mouse sequence")]
    UnsupportedSequence,
    #[error("invalid mouse sequence format")]
    InvalidFormat,
    #[error("mouse coordinates underflowed")]
    CoordinateUnderflow,
}

/// Detect the dialect from the escape introducer.
///
/// URxvt reports carry no distinguishing introducer, so they are only
/// recognised by [`parse_mouse_sequence`] once the whole sequence is known.
pub fn detect_protocol(buf: &[u8]) -> Option<MouseProtocol> {
    if buf.starts_with(b"\x1b[<") {
        Some(MouseProtocol::Sgr)
    } else if buf.starts_with(b"\x1b[M") {
        Some(MouseProtocol::X10)
    } else {
        None
    }
}

/// Decode one complete mouse report in any supported dialect.
pub fn parse_mouse_sequence(buf: &[u8]) -> Result<(MouseProtocol, MouseEvent), MouseParseError> {
    match detect_protocol(buf) {
        Some(MouseProtocol::Sgr) => parse_sgr(buf).map(|ev| (MouseProtocol::Sgr, ev)),
        Some(MouseProtocol::X10) => parse_x10(buf).map(|ev| (MouseProtocol::X10, ev)),
        _ if buf.starts_with(b"\x1b[") && buf.ends_with(b"M") => {
            parse_urxvt(buf).map(|ev| (MouseProtocol::Urxvt, ev))
        }
        _ => Err(MouseParseError::UnsupportedSequence),
    }
}

/// Decode `ESC [ < b ; x ; y (M|m)`.
pub fn parse_sgr(buf: &[u8]) -> Result<MouseEvent, MouseParseError> {
    let body = buf
        .strip_prefix(b"\x1b[<")
        .ok_or(MouseParseError::InvalidFormat)?;
    let (&last, params) = body.split_last().ok_or(MouseParseError::InvalidFormat)?;
    let release = match last {
        b'M' => false,
        b'm' => true,
        _ => return Err(MouseParseError::InvalidFormat),
    };

    let [encoded, x, y] = parse_triplet(params)?;
    let (button, mut action, modifiers) = decode_button(encoded);
    if release && action != MouseAction::Motion && !button.is_wheel() {
        action = MouseAction::Release;
    }

    Ok(MouseEvent {
        x: one_based(x)?,
        y: one_based(y)?,
        button,
        action,
        modifiers,
    })
}

/// Decode `ESC [ M b x y`.
///
/// Coordinates are single bytes, so positions beyond column/row 222 cannot
/// be represented in this dialect.
pub fn parse_x10(buf: &[u8]) -> Result<MouseEvent, MouseParseError> {
    if buf.len() != X10_SEQUENCE_LEN || !buf.starts_with(b"\x1b[M") {
        return Err(MouseParseError::InvalidFormat);
    }

    let encoded = u16::from(buf[3])
        .checked_sub(32)
        .ok_or(MouseParseError::InvalidFormat)?;
    let (button, action, modifiers) = decode_button(encoded);
    let x = u16::from(buf[4])
        .checked_sub(33)
        .ok_or(MouseParseError::CoordinateUnderflow)?;
    let y = u16::from(buf[5])
        .checked_sub(33)
        .ok_or(MouseParseError::CoordinateUnderflow)?;

    Ok(MouseEvent {
        x,
        y,
        button,
        action,
        modifiers,
    })
}

/// Decode `ESC [ b ; x ; y M`.
pub fn parse_urxvt(buf: &[u8]) -> Result<MouseEvent, MouseParseError> {
    let body = buf
        .strip_prefix(b"\x1b[")
        .and_then(|rest| rest.strip_suffix(b"M"))
        .ok_or(MouseParseError::InvalidFormat)?;

    let [encoded, x, y] = parse_triplet(body)?;
    let encoded = encoded
        .checked_sub(32)
        .ok_or(MouseParseError::InvalidFormat)?;
    let (button, action, modifiers) = decode_button(encoded);

    Ok(MouseEvent {
        x: one_based(x)?,
        y: one_based(y)?,
        button,
        action,
        modifiers,
    })
}

/// Split the xterm button byte into button, action and modifiers.
///
/// The low two bits select the button; `3` means "released, button unknown"
/// in the dialects that cannot say which one.
pub fn decode_button(encoded: u16) -> (MouseButton, MouseAction, KeyModifiers) {
    let mut action = MouseAction::Press;
    let button = if encoded & BIT_EXTRA != 0 {
        match encoded & BUTTON_MASK {
            0 => MouseButton::Backward,
            1 => MouseButton::Forward,
            2 => MouseButton::Button10,
            _ => MouseButton::Button11,
        }
    } else if encoded & BIT_WHEEL != 0 {
        match encoded & BUTTON_MASK {
            0 => MouseButton::WheelUp,
            1 => MouseButton::WheelDown,
            2 => MouseButton::WheelLeft,
            _ => MouseButton::WheelRight,
        }
    } else {
        match encoded & BUTTON_MASK {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => {
                action = MouseAction::Release;
                MouseButton::None
            }
        }
    };

    if encoded & BIT_MOTION != 0 && !button.is_wheel() {
        action = MouseAction::Motion;
    }

    let mut modifiers = KeyModifiers::empty();
    if encoded & BIT_SHIFT != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if encoded & BIT_ALT != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if encoded & BIT_CTRL != 0 {
        modifiers |= KeyModifiers::CONTROL;
    }

    (button, action, modifiers)
}

/// Parse exactly three `;`-separated decimal fields, saturating at `u16::MAX`.
fn parse_triplet(params: &[u8]) -> Result<[u16; 3], MouseParseError> {
    let mut fields = [0u16; 3];
    let mut count = 0;
    for part in params.split(|&b| b == b';') {
        if count == fields.len() || part.is_empty() {
            return Err(MouseParseError::InvalidFormat);
        }
        let mut value: u16 = 0;
        for &b in part {
            if !b.is_ascii_digit() {
                return Err(MouseParseError::InvalidFormat);
            }
            value = value.saturating_mul(10).saturating_add(u16::from(b - b'0'));
        }
        fields[count] = value;
        count += 1;
    }
    if count != fields.len() {
        return Err(MouseParseError::InvalidFormat);
    }
    Ok(fields)
}

#[inline]
fn one_based(value: u16) -> Result<u16, MouseParseError> {
    value
        .checked_sub(1)
        .ok_or(MouseParseError::CoordinateUnderflow)
}
