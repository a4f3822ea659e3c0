use font8x8::legacy::{BASIC_LEGACY, BLOCK_LEGACY, GREEK_LEGACY, HIRAGANA_LEGACY, LATIN_LEGACY};

/// Width and height of a glyph in font units.
pub const GLYPH_UNITS: usize = 8;

/// Inked area of a glyph in font units, right and bottom exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InkBox {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

/// Glyph measurement and drawing primitive supplied by the host.
///
/// Glyphs are monochrome bitmaps on an 8×8 unit square. Anti-aliasing is the
/// caller's business: surfaces and the mask rasterizer supersample the bitmap
/// at whatever scale they draw.
pub trait Typeface {
    /// One byte per row, top first; bit 0 is the leftmost unit.
    fn bitmap(&self, ch: char) -> [u8; GLYPH_UNITS];

    fn is_inked(&self, ch: char, x: usize, y: usize) -> bool {
        x < GLYPH_UNITS && y < GLYPH_UNITS && self.bitmap(ch)[y] & (1 << x) != 0
    }

    fn ink_box(&self, ch: char) -> Option<InkBox> {
        let bitmap = self.bitmap(ch);
        let mut ink: Option<InkBox> = None;
        for (y, row) in bitmap.iter().enumerate() {
            if *row == 0 {
                continue;
            }
            let left = row.trailing_zeros() as usize;
            let right = GLYPH_UNITS - row.leading_zeros() as usize;
            ink = Some(match ink {
                None => InkBox { left, top: y, right, bottom: y + 1 },
                Some(b) => InkBox {
                    left: b.left.min(left),
                    top: b.top,
                    right: b.right.max(right),
                    bottom: y + 1,
                },
            });
        }
        ink
    }
}

/// Built-in typeface covering ASCII, Latin-1, Greek, kana and block elements.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitmapFont;

impl BitmapFont {
    fn lookup(codepoint: u32) -> Option<[u8; GLYPH_UNITS]> {
        let code = codepoint as usize;
        match codepoint {
            0x00..=0x7F => BASIC_LEGACY.get(code).copied(),
            0xA0..=0xFF => LATIN_LEGACY.get(code - 0xA0).copied(),
            0x0390..=0x03C9 => GREEK_LEGACY.get(code - 0x0390).copied(),
            0x3040..=0x309F => HIRAGANA_LEGACY.get(code - 0x3040).copied(),
            // Katakana borrows the hiragana shapes sitting 0x60 below.
            0x30A1..=0x30F6 => HIRAGANA_LEGACY.get(code - 0x30A0).copied(),
            0x2580..=0x259F => BLOCK_LEGACY.get(code - 0x2580).copied(),
            _ => None,
        }
    }
}

impl Typeface for BitmapFont {
    fn bitmap(&self, ch: char) -> [u8; GLYPH_UNITS] {
        Self::lookup(ch as u32).unwrap_or(BASIC_LEGACY[b'?' as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_has_no_ink() {
        assert_eq!(BitmapFont.ink_box(' '), None);
    }

    #[test]
    fn letter_ink_is_inside_the_square() {
        let ink = BitmapFont.ink_box('B').unwrap();
        assert_eq!(ink.left, 0);
        assert!(ink.right <= GLYPH_UNITS);
        assert!(ink.top < ink.bottom);
    }

    #[test]
    fn unknown_glyphs_render_as_question_mark() {
        assert_eq!(BitmapFont.bitmap('\u{10FFFF}'), BitmapFont.bitmap('?'));
    }

    #[test]
    fn katakana_maps_onto_hiragana() {
        assert_eq!(BitmapFont.bitmap('\u{30A2}'), BitmapFont.bitmap('\u{3042}'));
    }
}
