//! Banner rendering shown on group joins
//!
//! Every group except the reserved `global` room gets an ASCII-art banner of
//! its capitalized name, rendered from a bitmap font file: 8 rows per glyph,
//! glyph for code point `c` starting at line `(c - 32) * 8`. The global room
//! gets a fixed welcome graphic embedded in the binary. A missing or broken
//! font is not fatal; rendering degrades to a plain one-line banner.

use crate::textpipe;
use std::path::Path;
use thiserror::Error;

/// Name of the reserved default room.
pub const GLOBAL_GROUP: &str = "global";

const GLYPH_ROWS: usize = 8;
const FIRST_GLYPH: char = ' ';
const LAST_GLYPH: char = '~';

static GLOBAL_WELCOME: &str = include_str!("../../assets/global_welcome.txt");

/// Banner font loading errors
#[derive(Debug, Error)]
pub enum BannerError {
    #[error("failed to read font file: {0}")]
    Io(#[from] std::io::Error),

    #[error("font file too short: {lines} lines, need at least {needed}")]
    Malformed { lines: usize, needed: usize },
}

/// A whole-ASCII bitmap font, one 8-row glyph per printable character.
pub struct FontBank {
    rows: Vec<String>,
}

impl FontBank {
    /// Load a font file. Carriage returns are stripped so DOS-formatted
    /// fonts work too.
    pub fn load(path: &Path) -> Result<Self, BannerError> {
        let raw = std::fs::read_to_string(path)?;
        let rows: Vec<String> = raw
            .replace('\r', "")
            .split('\n')
            .map(str::to_string)
            .collect();

        let glyphs = LAST_GLYPH as usize - FIRST_GLYPH as usize + 1;
        let needed = glyphs * GLYPH_ROWS;
        if rows.len() < needed {
            return Err(BannerError::Malformed {
                lines: rows.len(),
                needed,
            });
        }
        Ok(Self { rows })
    }

    fn glyph_row(&self, c: char, row: usize) -> &str {
        let offset = (c as usize - FIRST_GLYPH as usize) * GLYPH_ROWS + row;
        &self.rows[offset]
    }
}

/// Renders join banners, with or without a loaded font.
pub struct Renderer {
    font: Option<FontBank>,
}

impl Renderer {
    pub fn new(font: Option<FontBank>) -> Self {
        Self { font }
    }

    /// Build a renderer from an optional configured font path. Load
    /// failures are logged and leave the renderer in fallback mode.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        let font = path.and_then(|p| match FontBank::load(p) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!("Banner font unavailable ({}): {}", p.display(), e);
                None
            }
        });
        Self { font }
    }

    /// The banner sent when entering `group`.
    pub fn banner_for(&self, group: &str) -> String {
        if group == GLOBAL_GROUP {
            GLOBAL_WELCOME.to_string()
        } else {
            self.render(&textpipe::capitalize(group))
        }
    }

    /// Render a short label as 8 rows of font art. Characters outside the
    /// printable ASCII range are skipped.
    pub fn render(&self, label: &str) -> String {
        let Some(font) = &self.font else {
            return format!("*** {label} ***\n");
        };

        let mut out = String::new();
        for row in 0..GLYPH_ROWS {
            for c in label.chars() {
                if (FIRST_GLYPH..=LAST_GLYPH).contains(&c) {
                    out.push_str(font.glyph_row(c, row));
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Synthetic font: glyph for `c` is 8 rows of "<c><row>".
    fn write_test_font(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("font.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        for c in ' '..='~' {
            for row in 0..8 {
                writeln!(file, "{c}{row}").unwrap();
            }
        }
        path
    }

    #[test]
    fn renders_eight_rows_from_font() {
        let dir = tempfile::tempdir().unwrap();
        let font = FontBank::load(&write_test_font(&dir)).unwrap();
        let renderer = Renderer::new(Some(font));

        let art = renderer.render("Ab");
        let rows: Vec<&str> = art.lines().collect();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0], "A0b0");
        assert_eq!(rows[7], "A7b7");
    }

    #[test]
    fn truncated_font_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.txt");
        std::fs::write(&path, "only\nfour\nlines\nhere\n").unwrap();

        assert!(matches!(
            FontBank::load(&path),
            Err(BannerError::Malformed { .. })
        ));
    }

    #[test]
    fn global_room_uses_static_welcome() {
        let renderer = Renderer::new(None);
        assert!(renderer.banner_for("global").contains("WELCOME TO GLOBAL"));
    }

    #[test]
    fn fallback_banner_capitalizes_name() {
        let renderer = Renderer::new(None);
        assert_eq!(renderer.banner_for("news"), "*** News ***\n");
    }
}
