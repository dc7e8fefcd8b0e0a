//! User configuration — hotkeys, blueprint/DF locations and persistence.
//!
//! Settings are stored as a simple key-value text file at
//! `$XDG_CONFIG_HOME/quickfort/config.toml` (default `~/.config/quickfort/config.toml`).
//! Path values may reference variables as `${NAME}`; see
//! [`Variables::expand`](crate::bootstrap::env::Variables::expand).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyModifiers};

use crate::bootstrap::env::Variables;

// ───────────────────────────────────────── actions ───────────

/// All hotkey-triggered actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SelectFile,
    Play,
    Cancel,
    ToggleSuspend,
    ShowHelp,
}

impl Action {
    /// Ordered list of all actions.
    pub const ALL: &[Action] = &[
        Action::SelectFile,
        Action::Play,
        Action::Cancel,
        Action::ToggleSuspend,
        Action::ShowHelp,
    ];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Action::SelectFile => "Select Blueprint",
            Action::Play => "Play Blueprint",
            Action::Cancel => "Cancel Playback",
            Action::ToggleSuspend => "Suspend Hotkeys",
            Action::ShowHelp => "Show Help",
        }
    }

    /// Key used in the config file.
    fn config_key(self) -> &'static str {
        match self {
            Action::SelectFile => "select_file",
            Action::Play => "play",
            Action::Cancel => "cancel",
            Action::ToggleSuspend => "toggle_suspend",
            Action::ShowHelp => "show_help",
        }
    }

    fn from_config_key(s: &str) -> Option<Self> {
        match s {
            "select_file" => Some(Action::SelectFile),
            "play" => Some(Action::Play),
            "cancel" => Some(Action::Cancel),
            "toggle_suspend" => Some(Action::ToggleSuspend),
            "show_help" => Some(Action::ShowHelp),
            _ => None,
        }
    }
}

// ───────────────────────────────────────── key bind ──────────

/// A single hotkey — key code + modifier combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyBind {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBind {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Display and config-file form (e.g. `"Alt+f"`, `"Ctrl+Shift+F1"`).
    pub fn to_config_string(&self) -> String {
        let mut s = String::new();
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            s.push_str("Ctrl+");
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            s.push_str("Alt+");
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            s.push_str("Shift+");
        }
        s.push_str(&match self.code {
            KeyCode::Char(' ') => "Space".into(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".into(),
            KeyCode::Esc => "Esc".into(),
            KeyCode::Tab => "Tab".into(),
            KeyCode::Home => "Home".into(),
            KeyCode::End => "End".into(),
            KeyCode::PageUp => "PageUp".into(),
            KeyCode::PageDown => "PageDown".into(),
            KeyCode::F(n) => format!("F{n}"),
            other => format!("{other:?}"),
        });
        s
    }

    /// Parse a key string like `"Alt+f"`, `"Ctrl+Shift+F1"`, `"Esc"`.
    fn parse(s: &str) -> Option<Self> {
        let mut modifiers = KeyModifiers::NONE;
        let parts: Vec<&str> = s.split('+').collect();
        let key_part = parts.last()?;

        for &part in &parts[..parts.len() - 1] {
            match part.to_lowercase().as_str() {
                "ctrl" => modifiers |= KeyModifiers::CONTROL,
                "alt" => modifiers |= KeyModifiers::ALT,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                _ => return None,
            }
        }

        let code = match key_part.to_lowercase().as_str() {
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            "space" => KeyCode::Char(' '),
            s if s.starts_with('f') && s.len() > 1 => {
                let n: u8 = s[1..].parse().ok()?;
                KeyCode::F(n)
            }
            s if s.chars().count() == 1 => KeyCode::Char(s.chars().next()?),
            _ => return None,
        };

        Some(KeyBind { code, modifiers })
    }
}

// ───────────────────────────────────────── config ────────────

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bindings: HashMap<Action, Vec<KeyBind>>,
    /// Directory holding blueprint spreadsheets.
    pub blueprint_dir: Option<PathBuf>,
    /// Dwarf Fortress install directory (for `data/init/interface.txt`).
    pub df_dir: Option<PathBuf>,
    /// Use DF's 10-step cursor jumps when moving long distances.
    pub jump_moves: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bindings: Self::default_bindings(),
            blueprint_dir: None,
            df_dir: None,
            jump_moves: true,
        }
    }
}

impl AppConfig {
    /// Built-in hotkeys.
    pub fn default_bindings() -> HashMap<Action, Vec<KeyBind>> {
        use Action::*;
        let alt = KeyModifiers::ALT;
        let mut m = HashMap::new();

        m.insert(SelectFile, vec![KeyBind::new(KeyCode::Char('f'), alt)]);
        m.insert(Play, vec![KeyBind::new(KeyCode::Char('d'), alt)]);
        m.insert(Cancel, vec![KeyBind::new(KeyCode::Char('c'), alt)]);
        m.insert(ToggleSuspend, vec![KeyBind::new(KeyCode::Char('s'), alt)]);
        m.insert(ShowHelp, vec![KeyBind::new(KeyCode::Char('h'), alt)]);

        m
    }

    /// Format the binding list for a given action (e.g. `"Alt+f/F5"`).
    pub fn display_bindings(&self, action: Action) -> String {
        match self.bindings.get(&action) {
            Some(binds) if !binds.is_empty() => binds
                .iter()
                .map(|b| b.to_config_string())
                .collect::<Vec<_>>()
                .join("/"),
            _ => "unbound".into(),
        }
    }

    // ── persistence ─────────────────────────────────────────────

    /// Load config from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path, vars: &Variables) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => return Self::parse_config(&contents, vars),
                Err(e) => tracing::warn!("ignoring unreadable config {}: {e}", path.display()),
            }
        }
        Self::default()
    }

    /// Load config from `path`; the file must exist.
    pub fn load_required(path: &Path, vars: &Variables) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse_config(&contents, vars))
    }

    /// Persist config to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.serialise())?;
        Ok(())
    }

    fn parse_config(s: &str, vars: &Variables) -> Self {
        let mut config = Self::default();

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');

            match key {
                "blueprint_dir" => {
                    config.blueprint_dir = non_empty_path(value, vars);
                    continue;
                }
                "df_dir" => {
                    config.df_dir = non_empty_path(value, vars);
                    continue;
                }
                "jump_moves" => {
                    config.jump_moves = value == "true";
                    continue;
                }
                _ => {}
            }

            let Some(action) = Action::from_config_key(key) else {
                tracing::debug!("unknown config key `{key}`");
                continue;
            };

            let parsed: Vec<KeyBind> = value
                .split(',')
                .filter_map(|part| KeyBind::parse(part.trim().trim_matches('"')))
                .collect();
            if !parsed.is_empty() {
                config.bindings.insert(action, parsed);
            }
        }

        config
    }

    fn serialise(&self) -> String {
        let path_line = |key: &str, p: &Option<PathBuf>| match p {
            Some(p) => format!("{key} = \"{}\"", p.display()),
            None => format!("# {key} = \"${{HOME}}/...\""),
        };

        let mut lines = vec![
            "# quickfort configuration".to_string(),
            String::new(),
            "# Locations (may use ${HOME})".to_string(),
            path_line("blueprint_dir", &self.blueprint_dir),
            path_line("df_dir", &self.df_dir),
            String::new(),
            "# Cursor movement".to_string(),
            format!("jump_moves = {}", self.jump_moves),
            String::new(),
            "# Hotkeys".to_string(),
            "# Format: action = Key1, Key2, ...".to_string(),
            "# Modifiers: Ctrl+, Alt+, Shift+ (prefix)".to_string(),
            String::new(),
        ];

        for &action in Action::ALL {
            if let Some(binds) = self.bindings.get(&action) {
                let keys: Vec<String> = binds.iter().map(|b| b.to_config_string()).collect();
                lines.push(format!("{} = {}", action.config_key(), keys.join(", ")));
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

fn non_empty_path(value: &str, vars: &Variables) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(vars.expand(value)))
    }
}

/// Return the config file path (`$XDG_CONFIG_HOME/quickfort/config.toml`,
/// falling back to `$HOME/.config`).
pub fn config_path(vars: &Variables) -> PathBuf {
    let config_dir = vars
        .get("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = vars.get("HOME").unwrap_or_else(|| ".".into());
            PathBuf::from(home).join(".config")
        });
    config_dir.join(env!("CARGO_PKG_NAME")).join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::env::EnvMode;

    fn strict_vars() -> Variables {
        let mut vars = Variables::new(EnvMode::Strict);
        vars.define("HOME", "/home/urist");
        vars
    }

    #[test]
    fn parses_locations_and_hotkeys() {
        let text = "\
# comment
[section headers are ignored]
blueprint_dir = \"${HOME}/blueprints\"
df_dir = /games/df
jump_moves = false
play = Ctrl+Shift+F5, Alt+p
select_file = Nonsense+x
mystery = 1
";
        let cfg = AppConfig::parse_config(text, &strict_vars());
        assert_eq!(cfg.blueprint_dir, Some(PathBuf::from("/home/urist/blueprints")));
        assert_eq!(cfg.df_dir, Some(PathBuf::from("/games/df")));
        assert!(!cfg.jump_moves);
        assert_eq!(cfg.display_bindings(Action::Play), "Ctrl+Shift+F5/Alt+p");
        // Unparseable bindings keep the default.
        assert_eq!(cfg.display_bindings(Action::SelectFile), "Alt+f");
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let vars = strict_vars();

        let mut cfg = AppConfig::default();
        cfg.df_dir = Some(PathBuf::from("/games/df"));
        cfg.jump_moves = false;
        cfg.bindings
            .insert(Action::Cancel, vec![KeyBind::new(KeyCode::Esc, KeyModifiers::SHIFT)]);
        cfg.save(&path).unwrap();

        let loaded = AppConfig::load_required(&path, &vars).unwrap();
        assert_eq!(loaded.df_dir, cfg.df_dir);
        assert_eq!(loaded.blueprint_dir, None);
        assert!(!loaded.jump_moves);
        assert_eq!(loaded.display_bindings(Action::Cancel), "Shift+Esc");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let vars = strict_vars();
        let cfg = AppConfig::load(&dir.path().join("absent.toml"), &vars);
        assert!(cfg.jump_moves);
        assert_eq!(cfg.display_bindings(Action::Play), "Alt+d");
        assert!(AppConfig::load_required(&dir.path().join("absent.toml"), &vars).is_err());
    }

    #[test]
    fn config_path_resolves_through_variables() {
        let mut vars = strict_vars();
        assert_eq!(
            config_path(&vars),
            PathBuf::from("/home/urist/.config/quickfort/config.toml")
        );

        vars.define("XDG_CONFIG_HOME", "/etc/xdg");
        assert_eq!(config_path(&vars), PathBuf::from("/etc/xdg/quickfort/config.toml"));

        // Strict mode never consults the process environment.
        let bare = Variables::new(EnvMode::Strict);
        assert_eq!(config_path(&bare), PathBuf::from("./.config/quickfort/config.toml"));
    }
}
