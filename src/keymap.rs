use crate::model::ModelCatalog;
use crossterm::event::KeyCode;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// Keys the control surface understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Tab,
    Enter,
    Esc,
    F(u8),
}

impl Key {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "space" => return Some(Self::Char(' ')),
            "up" => return Some(Self::Up),
            "down" => return Some(Self::Down),
            "left" => return Some(Self::Left),
            "right" => return Some(Self::Right),
            "tab" => return Some(Self::Tab),
            "enter" | "return" => return Some(Self::Enter),
            "esc" | "escape" => return Some(Self::Esc),
            _ => {}
        }

        let lower = token.to_ascii_lowercase();
        if let Some(n) = lower.strip_prefix('f') {
            if let Ok(n) = n.parse::<u8>() {
                if (1..=12).contains(&n) {
                    return Some(Self::F(n));
                }
            }
        }

        let mut chars = token.chars();
        let c = chars.next()?;
        chars.next().is_none().then_some(Self::Char(c))
    }

    pub fn from_code(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char(c) => Some(Self::Char(c)),
            KeyCode::Up => Some(Self::Up),
            KeyCode::Down => Some(Self::Down),
            KeyCode::Left => Some(Self::Left),
            KeyCode::Right => Some(Self::Right),
            KeyCode::Tab => Some(Self::Tab),
            KeyCode::Enter => Some(Self::Enter),
            KeyCode::Esc => Some(Self::Esc),
            KeyCode::F(n) => Some(Self::F(n)),
            _ => None,
        }
    }

    pub fn label(self) -> String {
        match self {
            Self::Char(' ') => "space".to_string(),
            Self::Char(c) => c.to_string(),
            Self::Up => "up".to_string(),
            Self::Down => "down".to_string(),
            Self::Left => "left".to_string(),
            Self::Right => "right".to_string(),
            Self::Tab => "tab".to_string(),
            Self::Enter => "enter".to_string(),
            Self::Esc => "esc".to_string(),
            Self::F(n) => format!("f{n}"),
        }
    }
}

/// Everything a key press can ask the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Quit,
    CycleMode,
    NextChannel,
    SelectModel(usize),
    BlendUpSmall,
    BlendDownSmall,
    BlendUpLarge,
    BlendDownLarge,
    ResetBlend,
    TogglePulse,
    TriggerWave,
    AmplitudeUp,
    AmplitudeDown,
    SpeedUp,
    SpeedDown,
    WidthUp,
    WidthDown,
    FpsUp,
    FpsDown,
    ToggleHud,
    ToggleHelp,
    ToggleInset,
}

impl Action {
    /// Actions a key map must bind. Model selection comes from the catalog.
    pub const BINDABLE: [Action; 21] = [
        Action::Quit,
        Action::CycleMode,
        Action::NextChannel,
        Action::BlendUpSmall,
        Action::BlendDownSmall,
        Action::BlendUpLarge,
        Action::BlendDownLarge,
        Action::ResetBlend,
        Action::TogglePulse,
        Action::TriggerWave,
        Action::AmplitudeUp,
        Action::AmplitudeDown,
        Action::SpeedUp,
        Action::SpeedDown,
        Action::WidthUp,
        Action::WidthDown,
        Action::FpsUp,
        Action::FpsDown,
        Action::ToggleHud,
        Action::ToggleHelp,
        Action::ToggleInset,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::BINDABLE.into_iter().find(|a| a.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::CycleMode => "cycle_mode",
            Self::NextChannel => "next_channel",
            Self::SelectModel(_) => "select_model",
            Self::BlendUpSmall => "blend_up_small",
            Self::BlendDownSmall => "blend_down_small",
            Self::BlendUpLarge => "blend_up_large",
            Self::BlendDownLarge => "blend_down_large",
            Self::ResetBlend => "reset_blend",
            Self::TogglePulse => "toggle_pulse",
            Self::TriggerWave => "trigger_wave",
            Self::AmplitudeUp => "amplitude_up",
            Self::AmplitudeDown => "amplitude_down",
            Self::SpeedUp => "speed_up",
            Self::SpeedDown => "speed_down",
            Self::WidthUp => "width_up",
            Self::WidthDown => "width_down",
            Self::FpsUp => "fps_up",
            Self::FpsDown => "fps_down",
            Self::ToggleHud => "toggle_hud",
            Self::ToggleHelp => "toggle_help",
            Self::ToggleInset => "toggle_inset",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::CycleMode => "cycle blend mode: single/dual/triple",
            Self::NextChannel => "next blend channel (A/B/C)",
            Self::SelectModel(_) => "assign model to active channel",
            Self::BlendUpSmall => "blend toward active channel +5%",
            Self::BlendDownSmall => "blend away from active channel -5%",
            Self::BlendUpLarge => "blend toward active channel +10%",
            Self::BlendDownLarge => "blend away from active channel -10%",
            Self::ResetBlend => "reset blend weights",
            Self::TogglePulse => "toggle pulse distortion",
            Self::TriggerWave => "trigger a pulse wave",
            Self::AmplitudeUp => "wave amplitude up",
            Self::AmplitudeDown => "wave amplitude down",
            Self::SpeedUp => "wave speed up",
            Self::SpeedDown => "wave speed down",
            Self::WidthUp => "wave width up",
            Self::WidthDown => "wave width down",
            Self::FpsUp => "target fps up (video files)",
            Self::FpsDown => "target fps down (video files)",
            Self::ToggleHud => "show/hide HUD",
            Self::ToggleHelp => "toggle this help",
            Self::ToggleInset => "show/hide input preview",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyMapError {
    Io(String),
    Parse { line: usize, message: String },
    DuplicateKey { key: String },
    Unbound(&'static str),
    SlotCollision { key: String, action: &'static str },
}

impl fmt::Display for KeyMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse { line, message } => write!(f, "parse error at line {line}: {message}"),
            Self::DuplicateKey { key } => write!(f, "key '{key}' is bound more than once"),
            Self::Unbound(action) => write!(f, "action '{action}' has no key"),
            Self::SlotCollision { key, action } => {
                write!(f, "model slot key '{key}' collides with action '{action}'")
            }
        }
    }
}

impl std::error::Error for KeyMapError {}

const DEFAULT_BINDINGS: &[(Key, Action)] = &[
    (Key::Char('q'), Action::Quit),
    (Key::Esc, Action::Quit),
    (Key::Char('m'), Action::CycleMode),
    (Key::Tab, Action::NextChannel),
    (Key::Char('.'), Action::BlendUpSmall),
    (Key::Char(','), Action::BlendDownSmall),
    (Key::Char('>'), Action::BlendUpLarge),
    (Key::Char('<'), Action::BlendDownLarge),
    (Key::Char('r'), Action::ResetBlend),
    (Key::Char('p'), Action::TogglePulse),
    (Key::Char(' '), Action::TriggerWave),
    (Key::Char('='), Action::AmplitudeUp),
    (Key::Char('+'), Action::AmplitudeUp),
    (Key::Char('-'), Action::AmplitudeDown),
    (Key::Char(']'), Action::SpeedUp),
    (Key::Char('['), Action::SpeedDown),
    (Key::Char('}'), Action::WidthUp),
    (Key::Char('{'), Action::WidthDown),
    (Key::Up, Action::FpsUp),
    (Key::Down, Action::FpsDown),
    (Key::Char('i'), Action::ToggleHud),
    (Key::Char('h'), Action::ToggleHelp),
    (Key::Char('?'), Action::ToggleHelp),
    (Key::F(1), Action::ToggleHelp),
    (Key::Char('v'), Action::ToggleInset),
];

/// Key -> action table, validated so no key is ambiguous and every
/// bindable action is reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMap {
    bindings: BTreeMap<Key, Action>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            bindings: DEFAULT_BINDINGS.iter().copied().collect(),
        }
    }
}

impl KeyMap {
    pub fn from_bindings(pairs: &[(Key, Action)]) -> Result<Self, KeyMapError> {
        let mut bindings = BTreeMap::new();
        for &(key, action) in pairs {
            if bindings.insert(key, action).is_some() {
                return Err(KeyMapError::DuplicateKey { key: key.label() });
            }
        }
        let map = Self { bindings };
        map.validate()?;
        Ok(map)
    }

    /// Apply `bind <key> <action>` / `unbind <key>` lines on top of the
    /// default table.
    pub fn parse(text: &str) -> Result<Self, KeyMapError> {
        let mut bindings: BTreeMap<Key, Action> = DEFAULT_BINDINGS.iter().copied().collect();
        let mut bound_here = HashSet::new();

        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            match tokens.as_slice() {
                ["bind", key, action] => {
                    let key = parse_key(key, line_no)?;
                    let action = Action::parse(action).ok_or_else(|| KeyMapError::Parse {
                        line: line_no,
                        message: format!("unknown action '{action}'"),
                    })?;
                    if !bound_here.insert(key) {
                        return Err(KeyMapError::DuplicateKey { key: key.label() });
                    }
                    bindings.insert(key, action);
                }
                ["unbind", key] => {
                    let key = parse_key(key, line_no)?;
                    bindings.remove(&key);
                }
                ["bind", ..] => {
                    return Err(KeyMapError::Parse {
                        line: line_no,
                        message: "bind expects: bind <key> <action>".to_string(),
                    });
                }
                _ => {
                    return Err(KeyMapError::Parse {
                        line: line_no,
                        message: "expected 'bind' or 'unbind'".to_string(),
                    });
                }
            }
        }

        let map = Self { bindings };
        map.validate()?;
        Ok(map)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, KeyMapError> {
        let text =
            std::fs::read_to_string(path.as_ref()).map_err(|e| KeyMapError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn validate(&self) -> Result<(), KeyMapError> {
        for action in Action::BINDABLE {
            if !self.bindings.values().any(|a| *a == action) {
                return Err(KeyMapError::Unbound(action.as_str()));
            }
        }
        Ok(())
    }

    /// Model slot keys must not shadow a bound action.
    pub fn validate_against(&self, catalog: &ModelCatalog) -> Result<(), KeyMapError> {
        for slot in catalog.slots() {
            if let Some(action) = self.bindings.get(&Key::Char(slot.key)) {
                return Err(KeyMapError::SlotCollision {
                    key: slot.key.to_string(),
                    action: action.as_str(),
                });
            }
        }
        Ok(())
    }

    /// Bound actions first, then catalog slot keys.
    pub fn resolve(&self, key: Key, catalog: &ModelCatalog) -> Option<Action> {
        if let Some(action) = self.bindings.get(&key) {
            return Some(*action);
        }
        match key {
            Key::Char(c) => catalog.index_of_key(c).map(Action::SelectModel),
            _ => None,
        }
    }

    pub fn keys_for(&self, action: Action) -> Vec<Key> {
        self.bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn bindings(&self) -> &BTreeMap<Key, Action> {
        &self.bindings
    }

    /// Help popup body: one line per action with all of its keys.
    pub fn help_text(&self, catalog: &ModelCatalog) -> String {
        let mut lines = vec!["stylewave hotkeys".to_string()];
        for action in Action::BINDABLE {
            let keys = self
                .keys_for(action)
                .into_iter()
                .map(Key::label)
                .collect::<Vec<_>>()
                .join(" / ");
            lines.push(format!("{keys:<14} {}", action.description()));
        }
        lines.push("models:".to_string());
        for slot in catalog.slots() {
            lines.push(format!("  {:<12} {}", slot.key, slot.name));
        }
        lines.join("\n")
    }
}

fn parse_key(token: &str, line: usize) -> Result<Key, KeyMapError> {
    Key::parse(token).ok_or_else(|| KeyMapError::Parse {
        line,
        message: format!("unknown key '{token}'"),
    })
}
