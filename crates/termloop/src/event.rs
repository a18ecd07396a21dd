//! Message types delivered to the application.
//!
//! Every occurrence the runtime reports, whether decoded from the terminal,
//! produced by a command, or injected through a [`ProgramSender`], arrives
//! as a single [`Msg`] value.
//!
//! [`ProgramSender`]: crate::sender::ProgramSender

use std::any::Any;
use std::fmt;

use bitflags::bitflags;

use crate::command::ExecRequest;
use crate::interaction::Interaction;

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CONTROL = 1 << 2;
    }
}

impl KeyModifiers {
    /// Decode an xterm modifier parameter (`1 + bitmask`).
    pub(crate) fn from_xterm_param(param: u16) -> Self {
        let bits = param.saturating_sub(1);
        let mut modifiers = KeyModifiers::empty();
        if bits & 1 != 0 {
            modifiers |= KeyModifiers::SHIFT;
        }
        if bits & 2 != 0 {
            modifiers |= KeyModifiers::ALT;
        }
        if bits & 4 != 0 {
            modifiers |= KeyModifiers::CONTROL;
        }
        modifiers
    }
}

/// Identity of a pressed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character (any Unicode scalar value).
    Char(char),
    Space,
    Enter,
    Tab,
    /// Shift+Tab.
    BackTab,
    Backspace,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Function key `F1`..=`F12`.
    F(u8),
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::Space => f.write_str("space"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::BackTab => f.write_str("shift+tab"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Esc => f.write_str("esc"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pgup"),
            KeyCode::PageDown => f.write_str("pgdown"),
            KeyCode::Insert => f.write_str("insert"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::F(n) => write!(f, "f{n}"),
        }
    }
}

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl Key {
    /// A key with no modifiers.
    #[inline]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::empty(),
        }
    }

    /// A key with the given modifiers.
    #[inline]
    pub const fn with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Shorthand for `Ctrl+<c>`.
    #[inline]
    pub const fn ctrl(c: char) -> Self {
        Self::with_modifiers(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Whether this key is the `Ctrl+C` encoding of an interrupt.
    #[inline]
    pub fn is_interrupt(&self) -> bool {
        self.code == KeyCode::Char('c') && self.modifiers == KeyModifiers::CONTROL
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("alt+")?;
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) && self.code != KeyCode::BackTab {
            f.write_str("shift+")?;
        }
        write!(f, "{}", self.code)
    }
}

/// Mouse button identity, following X11 button numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    /// No button, as in plain motion or a legacy release report.
    #[default]
    None,
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
    /// Browser back (button 8).
    Backward,
    /// Browser forward (button 9).
    Forward,
    Button10,
    Button11,
}

impl MouseButton {
    /// Whether this is a wheel "button".
    #[inline]
    pub fn is_wheel(&self) -> bool {
        matches!(
            self,
            MouseButton::WheelUp
                | MouseButton::WheelDown
                | MouseButton::WheelLeft
                | MouseButton::WheelRight
        )
    }
}

/// What the pointer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseAction {
    #[default]
    Press,
    Release,
    Motion,
}

/// A decoded pointer report. Coordinates are 0-based terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub button: MouseButton,
    pub action: MouseAction,
    pub modifiers: KeyModifiers,
}

impl MouseEvent {
    /// A report with no modifiers.
    pub const fn new(x: u16, y: u16, button: MouseButton, action: MouseAction) -> Self {
        Self {
            x,
            y,
            button,
            action,
            modifiers: KeyModifiers::empty(),
        }
    }

    /// Whether this is a wheel report.
    #[inline]
    pub fn is_wheel(&self) -> bool {
        self.button.is_wheel()
    }
}

/// Terminal dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSize {
    pub width: u16,
    pub height: u16,
}

impl WindowSize {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// A size is usable only when both dimensions are positive.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// An application-defined message payload.
///
/// Commands and injected events carry arbitrary `Send` values through the
/// runtime in this wrapper; the model downcasts to the types it knows.
pub struct CustomMsg {
    payload: Box<dyn Any + Send>,
}

impl CustomMsg {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            payload: Box::new(value),
        }
    }

    /// Check whether the payload is a `T`.
    #[inline]
    pub fn is<T: Any + Send>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Try to take the payload as a `T`.
    pub fn downcast<T: Any + Send>(self) -> Result<T, Self> {
        match self.payload.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(payload) => Err(Self { payload }),
        }
    }

    /// Try to borrow the payload as a `T`.
    #[inline]
    pub fn downcast_ref<T: Any + Send>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for CustomMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomMsg(..)")
    }
}

/// One discrete occurrence delivered to [`Model::update`].
///
/// [`Model::update`]: crate::program::Model::update
#[derive(Debug)]
pub enum Msg {
    /// Keyboard input.
    Key(Key),
    /// Pointer input.
    Mouse(MouseEvent),
    /// Terminal was resized (also sent once at startup).
    Resize(WindowSize),
    /// Terminal gained focus.
    Focus,
    /// Terminal lost focus.
    Blur,
    /// Request to stop the program.
    Quit,
    /// The terminal interrupt byte (`Ctrl+C` in raw mode).
    Interrupt,
    /// Results of a [`batch`](crate::command::batch), in completion order.
    Batch(Vec<Msg>),
    /// Results of a [`sequence`](crate::command::sequence), in input order.
    Sequence(Vec<Msg>),
    /// Higher-level pointer interaction produced by the interaction engine.
    Interaction(Interaction),
    /// Application-defined payload.
    Custom(CustomMsg),
    /// Request to suspend the UI and run a child process.
    ///
    /// Handled by the runtime; never delivered to `update`.
    Exec(ExecRequest),
}

impl Msg {
    /// Wrap an application value.
    #[inline]
    pub fn custom<T: Any + Send>(value: T) -> Self {
        Msg::Custom(CustomMsg::new(value))
    }

    /// Check if this is a quit request.
    #[inline]
    pub fn is_quit(&self) -> bool {
        matches!(self, Msg::Quit)
    }

    /// Check if this is an interrupt, in either its dedicated or `Ctrl+C` form.
    #[inline]
    pub fn is_interrupt(&self) -> bool {
        match self {
            Msg::Interrupt => true,
            Msg::Key(key) => key.is_interrupt(),
            _ => false,
        }
    }

    /// Check if this is a specific key without modifiers.
    #[inline]
    pub fn is_key(&self, code: KeyCode) -> bool {
        matches!(self, Msg::Key(Key { code: c, modifiers }) if *c == code && modifiers.is_empty())
    }

    /// Whether this is a resize to a usable size.
    #[inline]
    pub fn is_valid_size(&self) -> bool {
        matches!(self, Msg::Resize(size) if size.is_valid())
    }

    /// Get the key if this is a key message.
    #[inline]
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Msg::Key(key) => Some(key),
            _ => None,
        }
    }

    /// Get the pointer report if this is a mouse message.
    #[inline]
    pub fn as_mouse(&self) -> Option<&MouseEvent> {
        match self {
            Msg::Mouse(mouse) => Some(mouse),
            _ => None,
        }
    }

    /// Borrow an application payload of type `T`.
    #[inline]
    pub fn downcast_ref<T: Any + Send>(&self) -> Option<&T> {
        match self {
            Msg::Custom(custom) => custom.downcast_ref(),
            _ => None,
        }
    }
}

impl From<Key> for Msg {
    fn from(key: Key) -> Self {
        Msg::Key(key)
    }
}

impl From<MouseEvent> for Msg {
    fn from(event: MouseEvent) -> Self {
        Msg::Mouse(event)
    }
}

impl From<WindowSize> for Msg {
    fn from(size: WindowSize) -> Self {
        Msg::Resize(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_forms_normalize() {
        assert!(Msg::Interrupt.is_interrupt());
        assert!(Msg::Key(Key::ctrl('c')).is_interrupt());
        assert!(!Msg::Key(Key::new(KeyCode::Char('c'))).is_interrupt());
        assert!(!Msg::Key(Key::with_modifiers(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL | KeyModifiers::ALT
        ))
        .is_interrupt());
    }

    #[test]
    fn test_window_size_validity() {
        assert!(WindowSize::new(80, 24).is_valid());
        assert!(!WindowSize::new(0, 24).is_valid());
        assert!(!WindowSize::new(80, 0).is_valid());
        assert!(Msg::from(WindowSize::new(1, 1)).is_valid_size());
        assert!(!Msg::from(WindowSize::new(0, 0)).is_valid_size());
        assert!(!Msg::Quit.is_valid_size());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::ctrl('c').to_string(), "ctrl+c");
        assert_eq!(Key::new(KeyCode::Up).to_string(), "up");
        assert_eq!(Key::new(KeyCode::F(5)).to_string(), "f5");
        assert_eq!(
            Key::with_modifiers(KeyCode::BackTab, KeyModifiers::SHIFT).to_string(),
            "shift+tab"
        );
        assert_eq!(
            Key::with_modifiers(KeyCode::Char('x'), KeyModifiers::ALT).to_string(),
            "alt+x"
        );
    }

    #[test]
    fn test_xterm_modifier_param() {
        assert_eq!(KeyModifiers::from_xterm_param(1), KeyModifiers::empty());
        assert_eq!(KeyModifiers::from_xterm_param(2), KeyModifiers::SHIFT);
        assert_eq!(KeyModifiers::from_xterm_param(3), KeyModifiers::ALT);
        assert_eq!(KeyModifiers::from_xterm_param(5), KeyModifiers::CONTROL);
        assert_eq!(
            KeyModifiers::from_xterm_param(6),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT
        );
    }

    #[test]
    fn test_custom_downcast() {
        let msg = Msg::custom(42u32);
        assert_eq!(msg.downcast_ref::<u32>(), Some(&42));
        assert_eq!(msg.downcast_ref::<i64>(), None);

        let Msg::Custom(custom) = msg else {
            panic!("expected custom message");
        };
        let custom = custom.downcast::<String>().unwrap_err();
        assert_eq!(custom.downcast::<u32>().unwrap(), 42);
    }
}
