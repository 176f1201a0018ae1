// Copyright 2026 The opal developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! OEM code page used for FAT short names. The low half of every OEM page
//! is ASCII; only the high half varies. Code page 437 is the default.

/// Code page 437 high half, 0x80..=0xFF.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Byte/char mapping for one OEM code page.
#[derive(Clone, Copy)]
pub struct OemTable {
    high: &'static [char; 128],
}

impl OemTable {
    pub const fn cp437() -> Self {
        Self { high: &CP437_HIGH }
    }

    pub fn decode_byte(&self, byte: u8) -> char {
        if byte < 0x80 {
            byte as char
        } else {
            self.high[(byte - 0x80) as usize]
        }
    }

    /// Encode one character, or `None` when the page cannot represent it.
    pub fn encode_char(&self, c: char) -> Option<u8> {
        if c.is_ascii() {
            return Some(c as u8);
        }
        self.high
            .iter()
            .position(|&candidate| candidate == c)
            .map(|index| 0x80 + index as u8)
    }
}

impl Default for OemTable {
    fn default() -> Self {
        Self::cp437()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passthrough() {
        let table = OemTable::cp437();
        assert_eq!(table.decode_byte(b'A'), 'A');
        assert_eq!(table.encode_char('A'), Some(b'A'));
    }

    #[test]
    fn high_half_roundtrip() {
        let table = OemTable::cp437();
        for byte in 0x80..=0xFFu8 {
            assert_eq!(table.encode_char(table.decode_byte(byte)), Some(byte));
        }
    }

    #[test]
    fn unrepresentable() {
        assert_eq!(OemTable::cp437().encode_char('€'), None);
    }
}
