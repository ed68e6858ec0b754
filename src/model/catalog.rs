use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Keys handed out, in order, when a catalog is built by scanning a directory.
pub const SCAN_SLOT_KEYS: [char; 10] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0'];

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSlot {
    pub key: char,
    pub path: PathBuf,
    pub name: String,
}

/// Table of selectable style models, addressed by slot index or key.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCatalog {
    slots: Vec<ModelSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    Io(String),
    Parse { line: usize, message: String },
    Empty,
    DuplicateKey(char),
    EmptyName(char),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse { line, message } => write!(f, "parse error at line {line}: {message}"),
            Self::Empty => write!(f, "model catalog must contain at least one slot"),
            Self::DuplicateKey(key) => write!(f, "duplicate slot key: '{key}'"),
            Self::EmptyName(key) => write!(f, "slot '{key}' has an empty display name"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl ModelCatalog {
    pub fn new(slots: Vec<ModelSlot>) -> Result<Self, CatalogError> {
        let catalog = Self { slots };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse `slot <key> <file> <display name...>` lines. Relative files are
    /// resolved against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, CatalogError> {
        let mut slots = Vec::new();

        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            if tokens.first().copied() != Some("slot") {
                return Err(CatalogError::Parse {
                    line: line_no,
                    message: "expected 'slot'".to_string(),
                });
            }
            if tokens.len() < 4 {
                return Err(CatalogError::Parse {
                    line: line_no,
                    message: "slot expects: slot <key> <file> <display name>".to_string(),
                });
            }

            let key = parse_key(tokens[1]).ok_or_else(|| CatalogError::Parse {
                line: line_no,
                message: format!("slot key must be a single character, got '{}'", tokens[1]),
            })?;
            let file = PathBuf::from(tokens[2]);
            let path = if file.is_absolute() {
                file
            } else {
                base_dir.join(file)
            };
            let name = tokens[3..].join(" ");

            slots.push(ModelSlot { key, path, name });
        }

        Self::new(slots)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CatalogError::Io(e.to_string()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    /// Build a catalog from the `*.json` files of `dir`, sorted by file name,
    /// keyed `1`..`9` then `0`. Extra files beyond ten are ignored.
    pub fn scan_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CatalogError::Io(format!("{}: {e}", dir.display())))?;

        let mut files = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>();
        files.sort();

        if files.len() > SCAN_SLOT_KEYS.len() {
            log::warn!(
                "{} model files in {}; only the first {} get slots",
                files.len(),
                dir.display(),
                SCAN_SLOT_KEYS.len()
            );
        }

        let slots = files
            .into_iter()
            .zip(SCAN_SLOT_KEYS)
            .map(|(path, key)| {
                let name = display_name_from_path(&path);
                ModelSlot { key, path, name }
            })
            .collect();

        Self::new(slots)
    }

    pub fn to_text(&self) -> String {
        self.slots
            .iter()
            .map(|s| format!("slot {} {} {}", s.key, s.path.display(), s.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.slots.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.key) {
                return Err(CatalogError::DuplicateKey(slot.key));
            }
            if slot.name.trim().is_empty() {
                return Err(CatalogError::EmptyName(slot.key));
            }
        }
        Ok(())
    }

    pub fn slots(&self) -> &[ModelSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModelSlot> {
        self.slots.get(index)
    }

    pub fn index_of_key(&self, key: char) -> Option<usize> {
        self.slots.iter().position(|s| s.key == key)
    }

    pub fn name(&self, index: usize) -> &str {
        self.slots.get(index).map(|s| s.name.as_str()).unwrap_or("?")
    }

    /// Resolve a `--model` argument: a slot key, a slot index, or a
    /// case-insensitive display-name substring.
    pub fn resolve(&self, selection: &str) -> Option<usize> {
        let raw = selection.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(key) = parse_key(raw) {
            if let Some(idx) = self.index_of_key(key) {
                return Some(idx);
            }
        }
        if let Ok(idx) = raw.parse::<usize>() {
            if idx < self.slots.len() {
                return Some(idx);
            }
        }
        let needle = raw.to_ascii_lowercase();
        self.slots
            .iter()
            .position(|s| s.name.to_ascii_lowercase() == needle)
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|s| s.name.to_ascii_lowercase().contains(&needle))
            })
    }
}

fn parse_key(token: &str) -> Option<char> {
    let mut chars = token.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn display_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts = stem
        .split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    // `03_candy` sorts by its prefix but displays as `Candy`.
    if parts.len() > 1 && parts[0].chars().all(|c| c.is_ascii_digit()) {
        parts.remove(0);
    }
    let words = parts
        .into_iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>();
    if words.is_empty() {
        "Model".to_string()
    } else {
        words.join(" ")
    }
}
