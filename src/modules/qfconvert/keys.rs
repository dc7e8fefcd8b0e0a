//! Keycode translation and output rendering.
//!
//! Keycodes are QuickFort's intermediate form: direction tokens like `[ne]`,
//! menu tokens like `[menudown]`, `!` (select), `#` (select all), `%`
//! (pause), `^` (leave menu) and plain DF keys.  They render either as
//! keystroke text or as a DF macro file.

use std::collections::HashMap;
use std::path::Path;

use rand::Rng;

use super::ConvertError;

/// Output flavour for converted keycodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputMode {
    /// Keystroke text, one token per key.
    Key,
    /// Complete DF macro file.
    Macro,
}

const KEY_TABLE: &[(&str, &str)] = &[
    (">", "^5"),
    ("<", "+5"),
    ("[n]", "8"),
    ("[ne]", "9"),
    ("[e]", "6"),
    ("[se]", "3"),
    ("[s]", "2"),
    ("[sw]", "1"),
    ("[w]", "4"),
    ("[nw]", "7"),
    ("[+n]", "+8"),
    ("[+ne]", "+9"),
    ("[+e]", "+6"),
    ("[+se]", "+3"),
    ("[+s]", "+2"),
    ("[+sw]", "+1"),
    ("[+w]", "+4"),
    ("[+nw]", "+7"),
    ("[widen]", "k"),
    ("[heighten]", "u"),
    ("[menudown]", "{NumpadAdd}"),
    ("[menuup]", "{NumpadSub}"),
    ("!", "{Enter}"),
    ("#", "+{Enter}"),
    ("%", "{wait}"),
    ("^", "{Esc}"),
];

// `^` is absent on purpose: macro output renders it as LEAVESCREEN.
const MACRO_TABLE: &[(&str, &str)] = &[
    (">", ">"),
    ("<", "<"),
    ("[n]", "0:8"),
    ("[ne]", "0:9"),
    ("[e]", "0:6"),
    ("[se]", "0:3"),
    ("[s]", "0:2"),
    ("[sw]", "0:1"),
    ("[w]", "0:4"),
    ("[nw]", "0:7"),
    ("[+n]", "1:8"),
    ("[+ne]", "1:9"),
    ("[+e]", "1:6"),
    ("[+se]", "1:3"),
    ("[+s]", "1:2"),
    ("[+sw]", "1:1"),
    ("[+w]", "1:4"),
    ("[+nw]", "1:7"),
    ("[widen]", "k"),
    ("[heighten]", "u"),
    ("[menudown]", "+"),
    ("[menuup]", "-"),
    ("!", "0:Enter"),
    ("#", "1:Enter"),
    ("%", ""),
];

/// Translate one keycode for `mode`; codes without a table entry pass
/// through unchanged.
pub fn translate_keycode(code: &str, mode: OutputMode) -> &str {
    let table = match mode {
        OutputMode::Key => KEY_TABLE,
        OutputMode::Macro => MACRO_TABLE,
    };
    match table.iter().find(|(k, _)| *k == code) {
        Some(&(_, translated)) => translated,
        None => code,
    }
}

/// Break a command string into keycodes.
///
/// `{...}` groups stay whole, `+` binds to the code after it, and every
/// other character is its own code.
pub fn split_keystring(keystring: &str) -> Vec<String> {
    let mut chars = keystring.chars();
    let mut codes = Vec::new();
    while let Some(code) = next_code(&mut chars) {
        codes.push(code);
    }
    codes
}

fn next_code(chars: &mut std::str::Chars<'_>) -> Option<String> {
    let c = chars.next()?;
    Some(match c {
        '{' => {
            let mut group = String::from('{');
            for n in chars.by_ref() {
                group.push(n);
                if n == '}' {
                    break;
                }
            }
            group
        }
        '+' => match next_code(chars) {
            Some(rest) => format!("+{rest}"),
            None => "+".to_string(),
        },
        other => other.to_string(),
    })
}

/// Render keycodes in the requested output mode.
///
/// Macro output needs `bindings` (from DF's `interface.txt`) and a title;
/// an empty or missing title gets a random `@@@qf` name.
pub fn convert_keys(
    codes: &[String],
    mode: OutputMode,
    title: Option<&str>,
    bindings: &KeyBindings,
) -> Result<String, ConvertError> {
    let translated: Vec<&str> = codes.iter().map(|c| translate_keycode(c, mode)).collect();
    match mode {
        OutputMode::Key => Ok(translated.concat()),
        OutputMode::Macro => {
            let title = match title {
                Some(t) if !t.is_empty() => t.to_string(),
                _ => random_title(),
            };
            let mut lines = macro_lines(&translated, title, bindings)?;
            lines.push(String::new());
            Ok(lines.join("\n"))
        }
    }
}

fn macro_lines(
    keys: &[&str],
    title: String,
    bindings: &KeyBindings,
) -> Result<Vec<String>, ConvertError> {
    let mut out = vec![title];
    for &key in keys {
        match key {
            "" => continue, // pauses have no macro equivalent
            "^" => out.push("\t\tLEAVESCREEN".into()),
            _ => {
                let binds = bindings
                    .get(key)
                    .ok_or_else(|| ConvertError::Unbound(key.to_string()))?;
                out.extend(binds.iter().cloned());
            }
        }
        out.push("\tEnd of group".into());
    }
    out.push("End of macro".into());
    Ok(out)
}

fn random_title() -> String {
    format!("@@@qf{}", rand::thread_rng().gen_range(0..999_999_999))
}

// ───────────────────────────────────────── interface.txt ─────

/// DF key bindings: key → macro command lines (`\t\tBIND_NAME`).
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    binds: HashMap<String, Vec<String>>,
}

impl KeyBindings {
    /// Parse DF's `interface.txt`.  Each `[BIND:NAME:...]` header is followed
    /// by `[KEY:x]` / `[SYM:x]` lines naming the keys bound to `NAME`.
    pub fn parse_interface_txt(text: &str) -> Self {
        let mut binds: HashMap<String, Vec<String>> = HashMap::new();

        for group in text.split("[BIND:").skip(1) {
            let mut lines = group.lines();
            let header = lines.next().unwrap_or_default();
            let bind = header
                .split(':')
                .next()
                .unwrap_or(header)
                .trim_end_matches(']')
                .trim();
            if bind.is_empty() {
                continue;
            }

            for line in lines {
                let line = line.trim();
                let key = line
                    .strip_prefix("[KEY:")
                    .or_else(|| line.strip_prefix("[SYM:"))
                    .and_then(|rest| rest.strip_suffix(']'));
                if let Some(key) = key.filter(|k| !k.is_empty()) {
                    binds
                        .entry(key.to_string())
                        .or_default()
                        .push(format!("\t\t{bind}"));
                }
            }
        }

        Self { binds }
    }

    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConvertError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_interface_txt(&text))
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.binds.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERFACE: &str = "\
[BIND:SELECT:REPEAT_NOT]
[SYM:0:Enter]
[BIND:SELECT_ALL:REPEAT_NOT]
[SYM:1:Enter]
[BIND:CURSOR_UP:REPEAT_SLOW]
[SYM:0:8]
[KEY:8]
[BIND:DESIGNATE_DIG:REPEAT_NOT]
[KEY:d]
[BIND:D_DESIGNATE:REPEAT_NOT]
[KEY:d]
";

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_groups_and_shift_combos() {
        assert_eq!(split_keystring("Cw"), ["C", "w"]);
        assert_eq!(split_keystring("{Enter}x!^"), ["{Enter}", "x", "!", "^"]);
        assert_eq!(split_keystring("+{Enter}a+5"), ["+{Enter}", "a", "+5"]);
        assert_eq!(split_keystring("a+"), ["a", "+"]);
        assert!(split_keystring("").is_empty());
    }

    #[test]
    fn translation_falls_back_to_the_code_itself() {
        assert_eq!(translate_keycode("[ne]", OutputMode::Key), "9");
        assert_eq!(translate_keycode("[+ne]", OutputMode::Macro), "1:9");
        assert_eq!(translate_keycode("d", OutputMode::Key), "d");
        assert_eq!(translate_keycode("^", OutputMode::Macro), "^");
    }

    #[test]
    fn key_mode_concatenates() {
        let out = convert_keys(
            &codes(&["d", "[e]", "[+s]", "!", "%", "^"]),
            OutputMode::Key,
            None,
            &KeyBindings::default(),
        )
        .unwrap();
        assert_eq!(out, "d6+2{Enter}{wait}{Esc}");
    }

    #[test]
    fn parses_interface_bindings() {
        let kb = KeyBindings::parse_interface_txt(INTERFACE);
        assert_eq!(kb.get("0:Enter").unwrap(), ["\t\tSELECT"]);
        assert_eq!(kb.get("8").unwrap(), ["\t\tCURSOR_UP"]);
        assert_eq!(kb.get("d").unwrap(), ["\t\tDESIGNATE_DIG", "\t\tD_DESIGNATE"]);
        assert_eq!(kb.len(), 5);
    }

    #[test]
    fn macro_mode_renders_groups() {
        let kb = KeyBindings::parse_interface_txt(INTERFACE);
        let out = convert_keys(
            &codes(&["[n]", "!", "%", "^", "#"]),
            OutputMode::Macro,
            Some("stairs"),
            &kb,
        )
        .unwrap();
        let expected = [
            "stairs",
            "\t\tCURSOR_UP",
            "\tEnd of group",
            "\t\tSELECT",
            "\tEnd of group",
            "\t\tLEAVESCREEN",
            "\tEnd of group",
            "\t\tSELECT_ALL",
            "\tEnd of group",
            "End of macro",
            "",
        ]
        .join("\n");
        assert_eq!(out, expected);
    }

    #[test]
    fn macro_mode_rejects_unbound_keys_and_titles_itself() {
        let kb = KeyBindings::parse_interface_txt(INTERFACE);
        let err = convert_keys(&codes(&["z"]), OutputMode::Macro, None, &kb).unwrap_err();
        assert!(matches!(err, ConvertError::Unbound(k) if k == "z"));

        let out = convert_keys(&codes(&[]), OutputMode::Macro, Some(""), &kb).unwrap();
        assert!(out.starts_with("@@@qf"));
        assert!(out.ends_with("End of macro\n"));
    }
}
