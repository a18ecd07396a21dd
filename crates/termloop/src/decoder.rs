//! Byte stream to [`Msg`] decoding.
//!
//! [`InputDecoder`] pulls bytes from any [`Read`] and hands back one logical
//! event per call:
//!
//! - control bytes (`0x00..=0x1f`, `0x7f`) become named keys or `Ctrl+<c>`
//! - `0x03` becomes [`Msg::Interrupt`]
//! - printable ASCII and complete UTF-8 sequences become [`KeyCode::Char`]
//! - `ESC [` (CSI) and `ESC O` (SS3) sequences become navigation and
//!   function keys, focus reports or mouse reports
//! - `ESC` followed by a printable byte becomes that key with `ALT`
//!
//! Malformed sequences are dropped and decoding resumes at the next byte.
//!
//! A trailing `ESC`, `ESC [` or `ESC O` is held back until more bytes
//! arrive, since it may be the start of a longer sequence. It is settled as
//! `Esc`, `Alt+[` or `Alt+O` at end of stream, or when the reader reports
//! [`io::ErrorKind::TimedOut`] to say no more bytes are coming soon.

use std::io::{self, Read};

use thiserror::Error;
use tracing::trace;

use crate::event::{Key, KeyCode, KeyModifiers, Msg};
use crate::mouse::{self, X10_SEQUENCE_LEN};

const READ_CHUNK: usize = 256;

/// Longest escape sequence accepted before it is treated as garbage.
const MAX_SEQUENCE_LEN: usize = 32;

const ESC: u8 = 0x1b;

/// Errors returned by [`InputDecoder::read`].
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The input stream is exhausted. Any incomplete trailing sequence has
    /// been discarded.
    #[error("end of input stream")]
    EndOfStream,
    #[error("input read failed: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of decoding the front of a buffer.
#[derive(Debug)]
pub(crate) enum Parsed {
    /// A complete event and the number of bytes it consumed.
    Event(Msg, usize),
    /// More bytes are needed.
    Incomplete,
    /// The first `n` bytes are garbage.
    Invalid(usize),
}

/// Result of one refill attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    /// Bytes were appended, or the stream ended.
    Data,
    /// The reader timed out waiting for more bytes.
    Idle,
}

/// Pull-based decoder over a byte stream.
pub struct InputDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: Read> InputDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Block until one complete event is available.
    ///
    /// Once the stream is exhausted every subsequent call returns
    /// [`DecodeError::EndOfStream`].
    pub fn read(&mut self) -> Result<Msg, DecodeError> {
        loop {
            if !self.buf.is_empty() {
                match parse_one(&self.buf) {
                    Parsed::Event(msg, len) => {
                        self.buf.drain(..len);
                        return Ok(msg);
                    }
                    Parsed::Invalid(len) => {
                        trace!(
                            target: "termloop::input",
                            bytes = ?&self.buf[..len],
                            "discarding malformed input"
                        );
                        self.buf.drain(..len);
                        continue;
                    }
                    Parsed::Incomplete if self.eof => {
                        if let Some(msg) = self.settle() {
                            return Ok(msg);
                        }
                        trace!(
                            target: "termloop::input",
                            bytes = ?self.buf,
                            "discarding incomplete sequence at end of input"
                        );
                        self.buf.clear();
                        return Err(DecodeError::EndOfStream);
                    }
                    Parsed::Incomplete => {}
                }
            } else if self.eof {
                return Err(DecodeError::EndOfStream);
            }

            if self.fill()? == Fill::Idle {
                if let Some(msg) = self.settle() {
                    return Ok(msg);
                }
            }
        }
    }

    /// Consume the decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Resolve a held-back escape prefix now that no more bytes follow it.
    fn settle(&mut self) -> Option<Msg> {
        let (msg, len) = settle_escape(&self.buf)?;
        self.buf.drain(..len);
        Some(msg)
    }

    fn fill(&mut self) -> Result<Fill, DecodeError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(Fill::Data);
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(Fill::Data);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(Fill::Idle),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[inline]
fn key(code: KeyCode, modifiers: KeyModifiers) -> Parsed {
    Parsed::Event(Msg::Key(Key::with_modifiers(code, modifiers)), 0)
}

/// Attach a consumed length to an event produced by [`key`].
#[inline]
fn consumed(parsed: Parsed, len: usize) -> Parsed {
    match parsed {
        Parsed::Event(msg, _) => Parsed::Event(msg, len),
        other => other,
    }
}

/// Decode the event at the front of `buf`. `buf` must not be empty.
pub(crate) fn parse_one(buf: &[u8]) -> Parsed {
    let first = buf[0];
    let none = KeyModifiers::empty();
    match first {
        ESC => parse_escape(buf),
        0x03 => Parsed::Event(Msg::Interrupt, 1),
        b'\r' | b'\n' => consumed(key(KeyCode::Enter, none), 1),
        b'\t' => consumed(key(KeyCode::Tab, none), 1),
        0x08 | 0x7f => consumed(key(KeyCode::Backspace, none), 1),
        b' ' => consumed(key(KeyCode::Space, none), 1),
        0x00 => consumed(key(KeyCode::Space, KeyModifiers::CONTROL), 1),
        0x01..=0x1a => {
            let letter = char::from(first - 1 + b'a');
            consumed(key(KeyCode::Char(letter), KeyModifiers::CONTROL), 1)
        }
        0x1c..=0x1f => {
            let symbol = char::from(first - 0x1c + b'\\');
            consumed(key(KeyCode::Char(symbol), KeyModifiers::CONTROL), 1)
        }
        0x21..=0x7e => consumed(key(KeyCode::Char(char::from(first)), none), 1),
        _ => parse_utf8(buf),
    }
}

fn parse_utf8(buf: &[u8]) -> Parsed {
    let len = match buf[0] {
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return Parsed::Invalid(1),
    };

    let available = buf.len().min(len);
    if buf[1..available].iter().any(|b| b & 0xc0 != 0x80) {
        return Parsed::Invalid(1);
    }
    if buf.len() < len {
        return Parsed::Incomplete;
    }

    match std::str::from_utf8(&buf[..len])
        .ok()
        .and_then(|s| s.chars().next())
    {
        Some(c) => consumed(key(KeyCode::Char(c), KeyModifiers::empty()), len),
        None => Parsed::Invalid(1),
    }
}

/// The key a buffer holding only `ESC`, `ESC [` or `ESC O` stands for once
/// nothing else is coming.
fn settle_escape(buf: &[u8]) -> Option<(Msg, usize)> {
    let key = match buf {
        [ESC] => Key::new(KeyCode::Esc),
        [ESC, b'['] => Key::with_modifiers(KeyCode::Char('['), KeyModifiers::ALT),
        [ESC, b'O'] => Key::with_modifiers(KeyCode::Char('O'), KeyModifiers::ALT),
        _ => return None,
    };
    Some((Msg::Key(key), buf.len()))
}

fn parse_escape(buf: &[u8]) -> Parsed {
    let Some(&next) = buf.get(1) else {
        return Parsed::Incomplete;
    };

    match next {
        b'[' | b'O' if buf.len() == 2 => Parsed::Incomplete,
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        ESC => consumed(key(KeyCode::Esc, KeyModifiers::ALT), 2),
        0x7f => consumed(key(KeyCode::Backspace, KeyModifiers::ALT), 2),
        b' ' => consumed(key(KeyCode::Space, KeyModifiers::ALT), 2),
        0x21..=0x7e => consumed(key(KeyCode::Char(char::from(next)), KeyModifiers::ALT), 2),
        _ => consumed(key(KeyCode::Esc, KeyModifiers::empty()), 1),
    }
}

fn parse_ss3(buf: &[u8]) -> Parsed {
    let none = KeyModifiers::empty();
    let code = match buf[2] {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return Parsed::Invalid(3),
    };
    consumed(key(code, none), 3)
}

fn parse_csi(buf: &[u8]) -> Parsed {
    match buf[2] {
        b'<' => return parse_sgr_mouse(buf),
        b'M' => return parse_x10_mouse(buf),
        _ => {}
    }

    // Parameter bytes 0x30..=0x3f, intermediates 0x20..=0x2f, final 0x40..=0x7e.
    let mut end = 2;
    loop {
        let Some(&b) = buf.get(end) else {
            return if end >= MAX_SEQUENCE_LEN {
                Parsed::Invalid(end)
            } else {
                Parsed::Incomplete
            };
        };
        match b {
            0x20..=0x3f => end += 1,
            0x40..=0x7e => break,
            _ => return Parsed::Invalid(end),
        }
        if end >= MAX_SEQUENCE_LEN {
            return Parsed::Invalid(end);
        }
    }

    let len = end + 1;
    let final_byte = buf[end];
    let Some(params) = parse_params(&buf[2..end]) else {
        return Parsed::Invalid(len);
    };

    if final_byte == b'M' && params.len() == 3 {
        return match mouse::parse_urxvt(&buf[..len]) {
            Ok(event) => Parsed::Event(Msg::Mouse(event), len),
            Err(err) => {
                trace!(target: "termloop::input", %err, "bad urxvt mouse report");
                Parsed::Invalid(len)
            }
        };
    }

    if params.is_empty() {
        match final_byte {
            b'I' => return Parsed::Event(Msg::Focus, len),
            b'O' => return Parsed::Event(Msg::Blur, len),
            _ => {}
        }
    }

    let modifiers = params
        .get(1)
        .map(|&p| KeyModifiers::from_xterm_param(p))
        .unwrap_or_default();

    let code = match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        b'Z' => return consumed(key(KeyCode::BackTab, KeyModifiers::SHIFT), len),
        b'~' => match params.first().copied().unwrap_or(0) {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            n @ 11..=15 => KeyCode::F((n - 10) as u8),
            n @ 17..=21 => KeyCode::F((n - 11) as u8),
            23 => KeyCode::F(11),
            24 => KeyCode::F(12),
            _ => return Parsed::Invalid(len),
        },
        _ => return Parsed::Invalid(len),
    };

    consumed(key(code, modifiers), len)
}

/// Parse `;`-separated decimal parameters. Empty fields count as `0`.
fn parse_params(raw: &[u8]) -> Option<Vec<u16>> {
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            field.iter().try_fold(0u16, |acc, &b| {
                b.is_ascii_digit()
                    .then(|| acc.saturating_mul(10).saturating_add(u16::from(b - b'0')))
            })
        })
        .collect()
}

fn parse_sgr_mouse(buf: &[u8]) -> Parsed {
    for (i, &b) in buf.iter().enumerate().skip(3) {
        match b {
            b'M' | b'm' => {
                let len = i + 1;
                return match mouse::parse_sgr(&buf[..len]) {
                    Ok(event) => Parsed::Event(Msg::Mouse(event), len),
                    Err(err) => {
                        trace!(target: "termloop::input", %err, "bad sgr mouse report");
                        Parsed::Invalid(len)
                    }
                };
            }
            b'0'..=b'9' | b';' => {}
            _ => return Parsed::Invalid(i),
        }
        if i >= MAX_SEQUENCE_LEN {
            return Parsed::Invalid(i);
        }
    }
    Parsed::Incomplete
}

fn parse_x10_mouse(buf: &[u8]) -> Parsed {
    if buf.len() < X10_SEQUENCE_LEN {
        return Parsed::Incomplete;
    }
    match mouse::parse_x10(&buf[..X10_SEQUENCE_LEN]) {
        Ok(event) => Parsed::Event(Msg::Mouse(event), X10_SEQUENCE_LEN),
        Err(err) => {
            trace!(target: "termloop::input", %err, "bad x10 mouse report");
            Parsed::Invalid(X10_SEQUENCE_LEN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MouseAction, MouseButton};
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(self.data.len()).min(out.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Replays scripted reads; `None` is a read that timed out.
    struct Scripted(VecDeque<Option<&'static [u8]>>);

    impl Read for Scripted {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Some(bytes)) => {
                    out[..bytes.len()].copy_from_slice(bytes);
                    Ok(bytes.len())
                }
                Some(None) => Err(io::ErrorKind::TimedOut.into()),
                None => Ok(0),
            }
        }
    }

    fn drain<R: Read>(mut decoder: InputDecoder<R>) -> Vec<Msg> {
        let mut out = Vec::new();
        loop {
            match decoder.read() {
                Ok(msg) => out.push(msg),
                Err(DecodeError::EndOfStream) => return out,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }

    fn decode_all(bytes: &[u8]) -> Vec<Msg> {
        drain(InputDecoder::new(bytes))
    }

    fn decode_scripted(reads: &[Option<&'static [u8]>]) -> Vec<String> {
        drain(InputDecoder::new(Scripted(reads.iter().copied().collect())))
            .iter()
            .map(|msg| format!("{msg:?}"))
            .collect()
    }

    fn debug(keys: &[Key]) -> Vec<String> {
        keys.iter().map(|k| format!("{:?}", Msg::Key(*k))).collect()
    }

    fn keys(bytes: &[u8]) -> Vec<Key> {
        decode_all(bytes)
            .into_iter()
            .map(|msg| match msg {
                Msg::Key(key) => key,
                other => panic!("expected key, got {other:?}"),
            })
            .collect()
    }

    fn one_key(bytes: &[u8]) -> Key {
        let decoded = keys(bytes);
        assert_eq!(decoded.len(), 1, "{bytes:?} -> {decoded:?}");
        decoded[0]
    }

    #[test]
    fn test_char_arrow_enter_in_order() {
        assert_eq!(
            keys(b"a\x1b[A\r"),
            vec![
                Key::new(KeyCode::Char('a')),
                Key::new(KeyCode::Up),
                Key::new(KeyCode::Enter)
            ]
        );
    }

    #[test]
    fn test_named_control_bytes() {
        assert_eq!(one_key(b"\r"), Key::new(KeyCode::Enter));
        assert_eq!(one_key(b" "), Key::new(KeyCode::Space));
        assert_eq!(one_key(b"\t"), Key::new(KeyCode::Tab));
        assert_eq!(one_key(b"\x7f"), Key::new(KeyCode::Backspace));
        assert_eq!(one_key(b"\x08"), Key::new(KeyCode::Backspace));
        assert_eq!(one_key(b"\x01"), Key::ctrl('a'));
        assert_eq!(one_key(b"\x1a"), Key::ctrl('z'));
        assert_eq!(one_key(b"\x1f"), Key::ctrl('_'));
    }

    #[test]
    fn test_interrupt_byte() {
        let decoded = decode_all(b"\x03");
        assert!(matches!(decoded.as_slice(), [Msg::Interrupt]));
        assert!(decoded[0].is_interrupt());
    }

    #[test]
    fn test_lone_escape() {
        assert_eq!(one_key(b"\x1b"), Key::new(KeyCode::Esc));
        assert_eq!(
            one_key(b"\x1b\x1b"),
            Key::with_modifiers(KeyCode::Esc, KeyModifiers::ALT)
        );
        assert_eq!(
            keys(b"\x1b\r"),
            vec![Key::new(KeyCode::Esc), Key::new(KeyCode::Enter)]
        );
    }

    #[test]
    fn test_alt_key() {
        assert_eq!(
            one_key(b"\x1bx"),
            Key::with_modifiers(KeyCode::Char('x'), KeyModifiers::ALT)
        );
        assert_eq!(
            one_key(b"\x1b["),
            Key::with_modifiers(KeyCode::Char('['), KeyModifiers::ALT)
        );
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(one_key(b"\x1b[B"), Key::new(KeyCode::Down));
        assert_eq!(one_key(b"\x1bOC"), Key::new(KeyCode::Right));
        assert_eq!(one_key(b"\x1b[H"), Key::new(KeyCode::Home));
        assert_eq!(one_key(b"\x1b[4~"), Key::new(KeyCode::End));
        assert_eq!(one_key(b"\x1b[5~"), Key::new(KeyCode::PageUp));
        assert_eq!(one_key(b"\x1b[6~"), Key::new(KeyCode::PageDown));
        assert_eq!(one_key(b"\x1b[2~"), Key::new(KeyCode::Insert));
        assert_eq!(one_key(b"\x1b[3~"), Key::new(KeyCode::Delete));
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(one_key(b"\x1bOP"), Key::new(KeyCode::F(1)));
        assert_eq!(one_key(b"\x1bOS"), Key::new(KeyCode::F(4)));
        assert_eq!(one_key(b"\x1b[15~"), Key::new(KeyCode::F(5)));
        assert_eq!(one_key(b"\x1b[21~"), Key::new(KeyCode::F(10)));
        assert_eq!(one_key(b"\x1b[24~"), Key::new(KeyCode::F(12)));
    }

    #[test]
    fn test_modified_keys() {
        assert_eq!(
            one_key(b"\x1b[1;5A"),
            Key::with_modifiers(KeyCode::Up, KeyModifiers::CONTROL)
        );
        assert_eq!(
            one_key(b"\x1b[3;2~"),
            Key::with_modifiers(KeyCode::Delete, KeyModifiers::SHIFT)
        );
        assert_eq!(
            one_key(b"\x1b[Z"),
            Key::with_modifiers(KeyCode::BackTab, KeyModifiers::SHIFT)
        );
    }

    #[test]
    fn test_focus_reports() {
        let decoded = decode_all(b"\x1b[I\x1b[O");
        assert!(matches!(decoded.as_slice(), [Msg::Focus, Msg::Blur]));
    }

    #[test]
    fn test_mouse_reports() {
        let decoded = decode_all(b"\x1b[<0;5;6M\x1b[M ##\x1b[32;2;3M");
        let events: Vec<_> = decoded.iter().filter_map(Msg::as_mouse).copied().collect();
        assert_eq!(events.len(), 3);
        assert_eq!((events[0].x, events[0].y), (4, 5));
        assert_eq!(events[1].button, MouseButton::Left);
        assert_eq!((events[1].x, events[1].y), (2, 2));
        assert_eq!((events[2].x, events[2].y), (1, 2));
        assert!(events.iter().all(|e| e.action == MouseAction::Press));
    }

    #[test]
    fn test_malformed_sequences_are_skipped() {
        // unknown final byte, unknown tilde code, bad mouse coordinate
        assert_eq!(
            keys(b"\x1b[9z\x1b[99~\x1b[<0;0;1Mq"),
            vec![Key::new(KeyCode::Char('q'))]
        );
        // stray continuation byte
        assert_eq!(keys(b"\x80a"), vec![Key::new(KeyCode::Char('a'))]);
    }

    #[test]
    fn test_sgr_with_garbage_resumes_at_offending_byte() {
        assert_eq!(
            keys(b"\x1b[<0;1x"),
            vec![Key::new(KeyCode::Char('x'))]
        );
    }

    #[test]
    fn test_sequence_split_across_reads() {
        let mut decoder = InputDecoder::new(Trickle {
            data: "\x1b[1;5Dé".as_bytes(),
            step: 3,
        });
        assert!(matches!(
            decoder.read().unwrap(),
            Msg::Key(k) if k == Key::with_modifiers(KeyCode::Left, KeyModifiers::CONTROL)
        ));
        assert!(matches!(
            decoder.read().unwrap(),
            Msg::Key(k) if k == Key::new(KeyCode::Char('é'))
        ));
        assert!(matches!(decoder.read(), Err(DecodeError::EndOfStream)));
    }

    #[test]
    fn test_escape_prefix_waits_for_more_bytes() {
        assert_eq!(
            decode_scripted(&[Some(&b"\x1b"[..]), Some(&b"[A"[..])]),
            debug(&[Key::new(KeyCode::Up)])
        );
        assert_eq!(
            decode_scripted(&[Some(&b"\x1b["[..]), Some(&b"B"[..])]),
            debug(&[Key::new(KeyCode::Down)])
        );
        assert_eq!(
            decode_scripted(&[Some(&b"\x1bO"[..]), Some(&b"P"[..])]),
            debug(&[Key::new(KeyCode::F(1))])
        );
        assert_eq!(decode_scripted(&[Some(&b"\x1b[<0;3"[..]), Some(&b";2M"[..])]).len(), 1);
    }

    #[test]
    fn test_escape_prefix_settled_by_timeout() {
        assert_eq!(
            decode_scripted(&[Some(&b"\x1b"[..]), None, Some(&b"x"[..])]),
            debug(&[Key::new(KeyCode::Esc), Key::new(KeyCode::Char('x'))])
        );
        assert_eq!(
            decode_scripted(&[Some(&b"\x1b["[..]), None, Some(&b"A"[..])]),
            debug(&[
                Key::with_modifiers(KeyCode::Char('['), KeyModifiers::ALT),
                Key::new(KeyCode::Char('A')),
            ])
        );
        // a timeout with nothing held back changes nothing
        assert_eq!(
            decode_scripted(&[None, Some(&b"a"[..]), None, Some(&b"\x1b[C"[..])]),
            debug(&[Key::new(KeyCode::Char('a')), Key::new(KeyCode::Right)])
        );
    }

    #[test]
    fn test_truncated_csi_survives_timeout() {
        assert_eq!(
            decode_scripted(&[Some(&b"\x1b[1;"[..]), None, Some(&b"5D"[..])]),
            debug(&[Key::with_modifiers(KeyCode::Left, KeyModifiers::CONTROL)])
        );
    }

    #[test]
    fn test_truncated_sequence_at_eof() {
        let mut decoder = InputDecoder::new(&b"z\x1b[1;5"[..]);
        assert!(matches!(decoder.read().unwrap(), Msg::Key(k) if k.code == KeyCode::Char('z')));
        assert!(matches!(decoder.read(), Err(DecodeError::EndOfStream)));
        assert!(matches!(decoder.read(), Err(DecodeError::EndOfStream)));

        let mut decoder = InputDecoder::new(&"中".as_bytes()[..2]);
        assert!(matches!(decoder.read(), Err(DecodeError::EndOfStream)));
    }

    #[test]
    fn test_multibyte_chars() {
        assert_eq!(
            keys("é中🦀".as_bytes()),
            vec![
                Key::new(KeyCode::Char('é')),
                Key::new(KeyCode::Char('中')),
                Key::new(KeyCode::Char('🦀')),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_one_event_per_code_point(
            chars in prop::collection::vec(
                any::<char>().prop_filter("printable", |c| !c.is_control() && *c != ' '),
                0..32,
            ),
            step in 1usize..8,
        ) {
            let text: String = chars.iter().collect();
            let mut decoder = InputDecoder::new(Trickle { data: text.as_bytes(), step });
            let mut decoded = Vec::new();
            loop {
                match decoder.read() {
                    Ok(Msg::Key(Key { code: KeyCode::Char(c), modifiers })) => {
                        prop_assert!(modifiers.is_empty());
                        decoded.push(c);
                    }
                    Ok(other) => prop_assert!(false, "unexpected {:?}", other),
                    Err(DecodeError::EndOfStream) => break,
                    Err(err) => prop_assert!(false, "unexpected error {}", err),
                }
            }
            prop_assert_eq!(decoded, chars);
        }

        #[test]
        fn prop_split_reads_decode_like_one_read(
            tokens in prop::collection::vec(input_token(), 0..24),
            step in 1usize..8,
        ) {
            let bytes: Vec<u8> = tokens.iter().flatten().copied().collect();
            let expected: Vec<String> = tokens
                .iter()
                .flat_map(|token| decode_all(token))
                .map(|msg| format!("{msg:?}"))
                .collect();
            prop_assert_eq!(expected.len(), tokens.len());

            let decoded: Vec<String> = drain(InputDecoder::new(Trickle { data: &bytes, step }))
                .iter()
                .map(|msg| format!("{msg:?}"))
                .collect();
            prop_assert_eq!(decoded, expected);
        }
    }

    /// One complete key or mouse report as raw bytes.
    fn input_token() -> impl Strategy<Value = Vec<u8>> {
        prop_oneof![
            any::<char>()
                .prop_filter("printable", |c| !c.is_control() && *c != ' ')
                .prop_map(|c| c.to_string().into_bytes()),
            prop::sample::select(vec![
                &b"\x1b[A"[..],
                &b"\x1b[D"[..],
                &b"\x1bOP"[..],
                &b"\x1b[15~"[..],
                &b"\x1b[1;5C"[..],
                &b"\x1b[Z"[..],
                &b"\x1b[I"[..],
                &b"\x1bx"[..],
                &b"\r"[..],
                &b"\t"[..],
            ])
            .prop_map(<[u8]>::to_vec),
            (0u16..3, 1u16..300, 1u16..300, any::<bool>()).prop_map(|(b, x, y, release)| {
                let last = if release { 'm' } else { 'M' };
                format!("\x1b[<{b};{x};{y}{last}").into_bytes()
            }),
        ]
    }
}
