use std::thread;
use std::time::Duration;

use lookout_core::error::InputError;
use lookout_core::response::InputDriver;
use lookout_types::{InputAction, Key as PlanKey, Modifier, MouseButton};
use rdev::{Button, EventType, Key};

/// Sends input through rdev. Each primitive event is followed by a short
/// settle pause so the OS keeps them in order.
pub struct RdevInputDriver {
    settle: Duration,
}

impl Default for RdevInputDriver {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(5),
        }
    }
}

impl InputDriver for RdevInputDriver {
    fn perform(&mut self, action: &InputAction) -> Result<(), InputError> {
        for event in to_events(action)? {
            rdev::simulate(&event)
                .map_err(|_| InputError::Rejected(format!("{event:?}")))?;
            thread::sleep(self.settle);
        }
        Ok(())
    }

    fn check(&self, action: &InputAction) -> Result<(), InputError> {
        to_events(action).map(|_| ())
    }
}

/// Logs each action instead of emitting it
pub struct DryRunDriver;

impl InputDriver for DryRunDriver {
    fn perform(&mut self, action: &InputAction) -> Result<(), InputError> {
        tracing::info!(?action, "dry run input");
        Ok(())
    }

    // Reject what the real driver could not type
    fn check(&self, action: &InputAction) -> Result<(), InputError> {
        to_events(action).map(|_| ())
    }
}

/// Expand one planned action into the OS-level events that perform it
pub fn to_events(action: &InputAction) -> Result<Vec<EventType>, InputError> {
    let events = match action {
        InputAction::MoveTo { x, y } => vec![EventType::MouseMove {
            x: *x as f64,
            y: *y as f64,
        }],
        InputAction::Click { button } => {
            let button = match button {
                MouseButton::Left => Button::Left,
                MouseButton::Right => Button::Right,
            };
            vec![EventType::ButtonPress(button), EventType::ButtonRelease(button)]
        }
        InputAction::KeyPress { key, modifiers } => {
            let (key, shift) = match key {
                PlanKey::Char(c) => char_key(*c)?,
                PlanKey::Enter => (Key::Return, false),
                PlanKey::Tab => (Key::Tab, false),
                PlanKey::Backspace => (Key::Backspace, false),
                PlanKey::Escape => (Key::Escape, false),
                PlanKey::Space => (Key::Space, false),
            };
            let mut held: Vec<Key> = modifiers.iter().map(modifier_key).collect();
            if shift && !held.contains(&Key::ShiftLeft) {
                held.push(Key::ShiftLeft);
            }
            chord(&held, key)
        }
        InputAction::TypeChar(c) => {
            let (key, shift) = char_key(*c)?;
            if shift {
                chord(&[Key::ShiftLeft], key)
            } else {
                chord(&[], key)
            }
        }
        InputAction::Wait => Vec::new(),
    };
    Ok(events)
}

fn modifier_key(modifier: &Modifier) -> Key {
    match modifier {
        Modifier::Control => Key::ControlLeft,
        Modifier::Shift => Key::ShiftLeft,
        Modifier::Alt => Key::Alt,
    }
}

/// Press modifiers, tap `key`, release modifiers in reverse
fn chord(held: &[Key], key: Key) -> Vec<EventType> {
    let mut events: Vec<EventType> = held.iter().map(|k| EventType::KeyPress(*k)).collect();
    events.push(EventType::KeyPress(key));
    events.push(EventType::KeyRelease(key));
    events.extend(held.iter().rev().map(|k| EventType::KeyRelease(*k)));
    events
}

/// US layout key for a character, and whether shift is needed
fn char_key(c: char) -> Result<(Key, bool), InputError> {
    const LETTERS: [Key; 26] = [
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
        Key::KeyG,
        Key::KeyH,
        Key::KeyI,
        Key::KeyJ,
        Key::KeyK,
        Key::KeyL,
        Key::KeyM,
        Key::KeyN,
        Key::KeyO,
        Key::KeyP,
        Key::KeyQ,
        Key::KeyR,
        Key::KeyS,
        Key::KeyT,
        Key::KeyU,
        Key::KeyV,
        Key::KeyW,
        Key::KeyX,
        Key::KeyY,
        Key::KeyZ,
    ];
    const DIGITS: [Key; 10] = [
        Key::Num0,
        Key::Num1,
        Key::Num2,
        Key::Num3,
        Key::Num4,
        Key::Num5,
        Key::Num6,
        Key::Num7,
        Key::Num8,
        Key::Num9,
    ];

    let mapped = match c {
        'a'..='z' => (LETTERS[(c as u8 - b'a') as usize], false),
        'A'..='Z' => (LETTERS[(c as u8 - b'A') as usize], true),
        '0'..='9' => (DIGITS[(c as u8 - b'0') as usize], false),
        ' ' => (Key::Space, false),
        '\n' => (Key::Return, false),
        '\t' => (Key::Tab, false),
        '.' => (Key::Dot, false),
        ',' => (Key::Comma, false),
        '-' => (Key::Minus, false),
        '=' => (Key::Equal, false),
        ';' => (Key::SemiColon, false),
        '\'' => (Key::Quote, false),
        '/' => (Key::Slash, false),
        '\\' => (Key::BackSlash, false),
        '[' => (Key::LeftBracket, false),
        ']' => (Key::RightBracket, false),
        '`' => (Key::BackQuote, false),
        '!' => (Key::Num1, true),
        '@' => (Key::Num2, true),
        '#' => (Key::Num3, true),
        '$' => (Key::Num4, true),
        '%' => (Key::Num5, true),
        '^' => (Key::Num6, true),
        '&' => (Key::Num7, true),
        '*' => (Key::Num8, true),
        '(' => (Key::Num9, true),
        ')' => (Key::Num0, true),
        '_' => (Key::Minus, true),
        '+' => (Key::Equal, true),
        ':' => (Key::SemiColon, true),
        '"' => (Key::Quote, true),
        '?' => (Key::Slash, true),
        '|' => (Key::BackSlash, true),
        '{' => (Key::LeftBracket, true),
        '}' => (Key::RightBracket, true),
        '~' => (Key::BackQuote, true),
        '<' => (Key::Comma, true),
        '>' => (Key::Dot, true),
        other => return Err(InputError::UnsupportedChar(other)),
    };
    Ok(mapped)
}
