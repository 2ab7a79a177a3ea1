//! Minimal ANSI styling for the pretty output paths.
//!
//! Color is on only when stdout is a terminal and `TERM` is usable, unless
//! forced with `-c`.

use std::io::IsTerminal;

#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn detect(force: bool) -> Self {
        let term_ok = std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false);
        Self {
            enabled: force || (std::io::stdout().is_terminal() && term_ok),
        }
    }

    pub fn off() -> Self {
        Self { enabled: false }
    }

    fn wrap(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn sat(&self, text: &str) -> String {
        self.wrap("32", text)
    }

    pub fn kind(&self, text: &str) -> String {
        self.wrap("36", text)
    }

    pub fn warn(&self, text: &str) -> String {
        self.wrap("33", text)
    }

    pub fn error(&self, text: &str) -> String {
        self.wrap("31", text)
    }
}

/// Bit-image hex dump for `-t 2`.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("  {:04x}:", i * 16));
        for b in chunk {
            out.push_str(&format!(" {b:02x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_style_is_passthrough() {
        let s = Style::off();
        assert_eq!(s.sat("G01"), "G01");
    }

    #[test]
    fn hex_dump_lines() {
        let dump = hex_dump(&[0u8; 20]);
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.starts_with("  0000:"));
    }
}
