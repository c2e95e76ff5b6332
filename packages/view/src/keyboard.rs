//! Key codes and keystrokes.
//!
//! A keystroke is a key code with modifier bits added on top, so
//! `ctrl+b` is `CTRL + 66`.

use crate::error::{ViewError, ViewResult};
use crate::observer::DomEvent;
use serde::{Deserialize, Serialize};

pub const CTRL: u32 = 0x110000;
pub const SHIFT: u32 = 0x220000;
pub const ALT: u32 = 0x440000;
pub const CMD: u32 = 0x880000;

const MODIFIER_MASK: u32 = CTRL | SHIFT | ALT | CMD;

const NAMED_KEYS: &[(&str, u32)] = &[
    ("backspace", 8),
    ("tab", 9),
    ("enter", 13),
    ("esc", 27),
    ("space", 32),
    ("pageup", 33),
    ("pagedown", 34),
    ("end", 35),
    ("home", 36),
    ("arrowleft", 37),
    ("arrowup", 38),
    ("arrowright", 39),
    ("arrowdown", 40),
    ("delete", 46),
    ("'", 222),
    (",", 108),
    ("-", 109),
    (".", 110),
    ("/", 111),
    (";", 186),
    ("=", 187),
    ("[", 219),
    ("\\", 220),
    ("]", 221),
    ("`", 223),
];

/// Key code for a key name such as `"b"`, `"arrowleft"`, `"f5"` or `"ctrl"`
pub fn key_code(name: &str) -> ViewResult<u32> {
    let name = name.trim().to_lowercase();
    match name.as_str() {
        "ctrl" => return Ok(CTRL),
        "shift" => return Ok(SHIFT),
        "alt" => return Ok(ALT),
        "cmd" => return Ok(CMD),
        _ => {}
    }

    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_lowercase() {
            return Ok(ch.to_ascii_uppercase() as u32);
        }
        if ch.is_ascii_digit() {
            return Ok(ch as u32);
        }
    }
    if let Some(number) = name.strip_prefix('f').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=12).contains(&number) {
            return Ok(111 + number);
        }
    }

    NAMED_KEYS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, code)| *code)
        .ok_or(ViewError::UnknownKey(name))
}

/// Parse `"ctrl+shift+z"` into a single keystroke code
pub fn parse_keystroke(keystroke: &str) -> ViewResult<u32> {
    keystroke
        .split('+')
        .map(key_code)
        .try_fold(0, |code, part| part.map(|part| code + part))
}

fn key_name(code: u32) -> Option<String> {
    match code {
        65..=90 | 48..=57 => char::from_u32(code).map(String::from),
        112..=123 => Some(format!("F{}", code - 111)),
        _ => NAMED_KEYS.iter().find(|(_, key)| *key == code).map(|(name, _)| {
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }),
    }
}

/// Human readable form, e.g. `"Ctrl+Shift+Z"`
pub fn keystroke_to_string(keystroke: u32) -> String {
    let mut parts = Vec::new();
    for (modifier, label) in [(CTRL, "Ctrl"), (ALT, "Alt"), (SHIFT, "Shift"), (CMD, "Cmd")] {
        if keystroke & modifier == modifier {
            parts.push(label.to_string());
        }
    }
    let code = keystroke & !MODIFIER_MASK;
    if code != 0 {
        parts.push(key_name(code).unwrap_or_else(|| code.to_string()));
    }
    parts.join("+")
}

pub fn is_arrow_key_code(code: u32) -> bool {
    (37..=40).contains(&code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeInfo {
    pub key_code: u32,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub shift_key: bool,
    pub meta_key: bool,
    pub keystroke: u32,
}

impl KeystrokeInfo {
    /// `None` for events that carry no key code
    pub fn from_dom_event(event: &DomEvent) -> Option<Self> {
        let key_code = event.key_code?;
        let mut keystroke = key_code;
        if event.ctrl_key {
            keystroke += CTRL;
        }
        if event.shift_key {
            keystroke += SHIFT;
        }
        if event.alt_key {
            keystroke += ALT;
        }
        if event.meta_key {
            keystroke += CMD;
        }
        Some(Self {
            key_code,
            ctrl_key: event.ctrl_key,
            alt_key: event.alt_key,
            shift_key: event.shift_key,
            meta_key: event.meta_key,
            keystroke,
        })
    }

    pub fn matches(&self, keystroke: &str) -> bool {
        parse_keystroke(keystroke).is_ok_and(|code| code == self.keystroke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keystroke() {
        assert_eq!(parse_keystroke("ctrl+b").expect("Failed to parse"), CTRL + 66);
        assert_eq!(parse_keystroke("Ctrl+Shift+Z").expect("Failed to parse"), CTRL + SHIFT + 90);
        assert_eq!(parse_keystroke("f5").expect("Failed to parse"), 116);
        assert!(matches!(parse_keystroke("ctrl+nope"), Err(ViewError::UnknownKey(key)) if key == "nope"));
    }

    #[test]
    fn test_keystroke_to_string() {
        assert_eq!(keystroke_to_string(CTRL + SHIFT + 90), "Ctrl+Shift+Z");
        assert_eq!(keystroke_to_string(37), "Arrowleft");
    }

    #[test]
    fn test_keystroke_info_from_event() {
        let event = DomEvent::new("keydown", "main").with_key_code(66).with_ctrl();
        let info = KeystrokeInfo::from_dom_event(&event).expect("Event has a key code");
        assert!(info.ctrl_key);
        assert!(info.matches("ctrl+b"));
        assert!(!info.matches("ctrl+i"));
        assert!(KeystrokeInfo::from_dom_event(&DomEvent::new("click", "main")).is_none());
    }
}
