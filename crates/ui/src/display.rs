//! Character display capability
//!
//! The engine draws through the [`Display`] trait: a character grid with a
//! cursor that advances on every write and eight programmable glyph slots.
//! [`Panel`] owns the one display instance behind an async mutex; every
//! multi-row update holds that lock for its whole duration.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

/// Number of programmable glyph slots on the controller
pub const GLYPH_SLOTS: u8 = 8;

/// Output side of the panel hardware
///
/// Coordinates are zero-based `(column, row)`. Writes past the right edge
/// are dropped by the adapter.
pub trait Display: Send {
    fn clear(&mut self);
    fn set_cursor(&mut self, column: usize, row: usize);
    fn write(&mut self, text: &str);
    /// Program glyph `slot` (0-7) with an 8-row, 5-bit-wide bitmap
    fn create_glyph(&mut self, slot: u8, bitmap: [u8; 8]);
    /// `(columns, rows)`
    fn size(&self) -> (usize, usize);
    fn set_backlight(&mut self, on: bool);

    fn write_at(&mut self, column: usize, row: usize, text: &str) {
        self.set_cursor(column, row);
        self.write(text);
    }

    fn load_character_set(&mut self, set: CharacterSet) {
        for glyph in set.glyphs() {
            self.create_glyph(glyph.slot(), glyph.bitmap());
        }
    }
}

/// Glyphs programmed into the controller's custom character slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Glyph {
    ProgressHalf,
    ProgressFull,
    ProgressBackground,
    LogoTopLeft,
    LogoTopRight,
    LogoBottomLeft,
    LogoBottomRight,
    ArrowUp,
    ArrowDown,
    Degrees,
    SelectedItem,
    SelectedPage,
}

impl Glyph {
    pub const ALL: [Glyph; 12] = [
        Glyph::ProgressHalf,
        Glyph::ProgressFull,
        Glyph::ProgressBackground,
        Glyph::LogoTopLeft,
        Glyph::LogoTopRight,
        Glyph::LogoBottomLeft,
        Glyph::LogoBottomRight,
        Glyph::ArrowUp,
        Glyph::ArrowDown,
        Glyph::Degrees,
        Glyph::SelectedItem,
        Glyph::SelectedPage,
    ];

    /// Slot the glyph occupies once its character set is loaded
    pub fn slot(self) -> u8 {
        match self {
            Glyph::ProgressHalf => 0,
            Glyph::ProgressFull => 1,
            Glyph::ProgressBackground => 2,
            Glyph::LogoTopLeft | Glyph::ArrowUp => 3,
            Glyph::LogoTopRight | Glyph::ArrowDown => 4,
            Glyph::LogoBottomLeft | Glyph::Degrees => 5,
            Glyph::LogoBottomRight | Glyph::SelectedItem => 6,
            Glyph::SelectedPage => 7,
        }
    }

    pub fn bitmap(self) -> [u8; 8] {
        match self {
            Glyph::ProgressHalf => [
                0b00000, 0b11100, 0b11100, 0b11111, 0b11111, 0b11100, 0b11100, 0b00000,
            ],
            Glyph::ProgressFull => [
                0b00000, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b00000,
            ],
            Glyph::ProgressBackground => [
                0b00000, 0b00000, 0b00000, 0b11111, 0b11111, 0b00000, 0b00000, 0b00000,
            ],
            Glyph::LogoTopLeft => [
                0b00000, 0b00000, 0b00000, 0b11111, 0b10000, 0b10111, 0b10100, 0b10101,
            ],
            Glyph::LogoTopRight => [
                0b00000, 0b00000, 0b00000, 0b11111, 0b00001, 0b11101, 0b00101, 0b10101,
            ],
            Glyph::LogoBottomLeft => [
                0b10101, 0b10100, 0b10111, 0b10000, 0b11111, 0b00000, 0b00000, 0b00000,
            ],
            Glyph::LogoBottomRight => [
                0b10101, 0b00101, 0b11101, 0b00001, 0b11111, 0b00000, 0b00000, 0b00000,
            ],
            Glyph::ArrowUp => [0b00010, 0b00111, 0, 0, 0, 0, 0, 0],
            Glyph::ArrowDown => [0, 0, 0, 0, 0, 0, 0b00111, 0b00010],
            Glyph::Degrees => [0b00110, 0b01001, 0b01001, 0b00110, 0, 0, 0, 0],
            Glyph::SelectedItem => [
                0b00000, 0b00000, 0b01100, 0b11110, 0b11110, 0b01100, 0b00000, 0b00000,
            ],
            Glyph::SelectedPage => [
                0b00000, 0b10000, 0b11000, 0b11100, 0b11000, 0b10000, 0b00000, 0b00000,
            ],
        }
    }

    /// Character code that renders this glyph
    pub fn as_char(self) -> char {
        char::from(self.slot())
    }

    /// Closest Unicode approximation, used by terminal renderers
    pub fn preview(self) -> char {
        match self {
            Glyph::ProgressHalf => '▌',
            Glyph::ProgressFull => '█',
            Glyph::ProgressBackground => '━',
            Glyph::LogoTopLeft => '┏',
            Glyph::LogoTopRight => '┓',
            Glyph::LogoBottomLeft => '┗',
            Glyph::LogoBottomRight => '┛',
            Glyph::ArrowUp => '▴',
            Glyph::ArrowDown => '▾',
            Glyph::Degrees => '°',
            Glyph::SelectedItem => '•',
            Glyph::SelectedPage => '▸',
        }
    }

    /// Find the glyph whose bitmap was programmed into a slot
    pub fn identify(bitmap: &[u8; 8]) -> Option<Glyph> {
        Glyph::ALL.into_iter().find(|glyph| glyph.bitmap() == *bitmap)
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The two glyph layouts; slots 3-7 differ between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Splash,
    Application,
}

impl CharacterSet {
    pub fn glyphs(self) -> &'static [Glyph] {
        match self {
            CharacterSet::Splash => &[
                Glyph::ProgressHalf,
                Glyph::ProgressFull,
                Glyph::ProgressBackground,
                Glyph::LogoTopLeft,
                Glyph::LogoTopRight,
                Glyph::LogoBottomLeft,
                Glyph::LogoBottomRight,
            ],
            CharacterSet::Application => &[
                Glyph::ProgressHalf,
                Glyph::ProgressFull,
                Glyph::ProgressBackground,
                Glyph::ArrowUp,
                Glyph::ArrowDown,
                Glyph::Degrees,
                Glyph::SelectedItem,
                Glyph::SelectedPage,
            ],
        }
    }
}

pub type DisplayGuard<'a> = tokio::sync::MutexGuard<'a, Box<dyn Display>>;

/// Shared handle to the single display
#[derive(Clone)]
pub struct Panel {
    display: Arc<tokio::sync::Mutex<Box<dyn Display>>>,
    columns: usize,
    rows: usize,
}

impl Panel {
    pub fn new(display: impl Display + 'static) -> Self {
        let (columns, rows) = display.size();
        Self {
            display: Arc::new(tokio::sync::Mutex::new(Box::new(display))),
            columns,
            rows,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Acquire the display for a sequence of writes
    pub async fn lock(&self) -> DisplayGuard<'_> {
        self.display.lock().await
    }

    pub async fn set_backlight(&self, on: bool) {
        trace!("Backlight {}", if on { "on" } else { "off" });
        self.lock().await.set_backlight(on);
    }
}

/// Truncate or right-pad `text` to exactly `width` characters
pub fn pad(text: &str, width: usize) -> String {
    let mut padded: String = text.chars().take(width).collect();
    let length = padded.chars().count();
    padded.extend(std::iter::repeat_n(' ', width - length));
    padded
}

/// In-memory character grid
///
/// Clones share the same screen, so a test or the terminal simulator can
/// keep a handle while the [`Panel`] owns another.
#[derive(Clone)]
pub struct MemoryDisplay {
    screen: Arc<Mutex<Screen>>,
}

struct Screen {
    columns: usize,
    rows: usize,
    cells: Vec<Vec<char>>,
    cursor: (usize, usize),
    backlight: bool,
    glyphs: [Option<[u8; 8]>; GLYPH_SLOTS as usize],
    writes: usize,
}

impl MemoryDisplay {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            screen: Arc::new(Mutex::new(Screen {
                columns,
                rows,
                cells: vec![vec![' '; columns]; rows],
                cursor: (0, 0),
                backlight: true,
                glyphs: [None; GLYPH_SLOTS as usize],
                writes: 0,
            })),
        }
    }

    fn screen(&self) -> std::sync::MutexGuard<'_, Screen> {
        self.screen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw characters of one row, glyph slots included as control characters
    pub fn row(&self, row: usize) -> String {
        self.screen()
            .cells
            .get(row)
            .map(|cells| cells.iter().collect())
            .unwrap_or_default()
    }

    pub fn text(&self) -> Vec<String> {
        let rows = self.screen().rows;
        (0..rows).map(|row| self.row(row)).collect()
    }

    /// One row with glyph slots replaced by their Unicode previews
    pub fn preview_row(&self, row: usize) -> String {
        let screen = self.screen();
        let Some(cells) = screen.cells.get(row) else {
            return String::new();
        };
        cells
            .iter()
            .map(|&c| {
                let code = c as u32;
                if code < u32::from(GLYPH_SLOTS) {
                    screen.glyphs[code as usize]
                        .as_ref()
                        .and_then(Glyph::identify)
                        .map(Glyph::preview)
                        .unwrap_or('?')
                } else {
                    c
                }
            })
            .collect()
    }

    pub fn preview(&self) -> Vec<String> {
        let rows = self.screen().rows;
        (0..rows).map(|row| self.preview_row(row)).collect()
    }

    pub fn backlight(&self) -> bool {
        self.screen().backlight
    }

    pub fn glyph(&self, slot: u8) -> Option<[u8; 8]> {
        self.screen().glyphs.get(slot as usize).copied().flatten()
    }

    /// Number of `write` calls so far
    pub fn writes(&self) -> usize {
        self.screen().writes
    }
}

impl Display for MemoryDisplay {
    fn clear(&mut self) {
        let mut screen = self.screen();
        for row in screen.cells.iter_mut() {
            row.fill(' ');
        }
        screen.cursor = (0, 0);
    }

    fn set_cursor(&mut self, column: usize, row: usize) {
        self.screen().cursor = (column, row);
    }

    fn write(&mut self, text: &str) {
        let mut screen = self.screen();
        screen.writes += 1;
        let (mut column, row) = screen.cursor;
        let (columns, rows) = (screen.columns, screen.rows);
        for c in text.chars() {
            if column < columns && row < rows {
                screen.cells[row][column] = c;
            }
            column += 1;
        }
        screen.cursor = (column, row);
    }

    fn create_glyph(&mut self, slot: u8, bitmap: [u8; 8]) {
        if slot >= GLYPH_SLOTS {
            warn!("Ignoring glyph for slot {}, only {} slots exist", slot, GLYPH_SLOTS);
            return;
        }
        self.screen().glyphs[slot as usize] = Some(bitmap);
    }

    fn size(&self) -> (usize, usize) {
        let screen = self.screen();
        (screen.columns, screen.rows)
    }

    fn set_backlight(&mut self, on: bool) {
        self.screen().backlight = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_advances_cursor_and_clips() {
        let mut display = MemoryDisplay::new(8, 2);

        display.write_at(5, 1, "abcdef");
        display.write("zz");

        assert_eq!(display.row(0), "        ");
        assert_eq!(display.row(1), "     abc");
        assert_eq!(display.writes(), 2);
    }

    #[test]
    fn test_clear_resets_grid() {
        let mut display = MemoryDisplay::new(4, 2);
        display.write("full");
        display.clear();
        display.write("x");

        assert_eq!(display.text(), vec!["x   ".to_string(), "    ".to_string()]);
    }

    #[test]
    fn test_character_sets_share_progress_slots() {
        for set in [CharacterSet::Splash, CharacterSet::Application] {
            let slots: Vec<u8> = set.glyphs().iter().map(|g| g.slot()).collect();
            assert_eq!(&slots[..3], &[0, 1, 2]);
            let mut unique = slots.clone();
            unique.dedup();
            assert_eq!(unique.len(), slots.len());
        }
    }

    #[test]
    fn test_preview_follows_loaded_set() {
        let mut display = MemoryDisplay::new(3, 1);
        display.load_character_set(CharacterSet::Splash);
        display.write(&format!("{}{}", Glyph::LogoTopLeft, Glyph::ProgressFull));
        assert_eq!(display.preview_row(0), "┏█ ");

        display.load_character_set(CharacterSet::Application);
        assert_eq!(display.preview_row(0), "▴█ ");
    }

    #[test]
    fn test_bitmaps_are_distinct_and_five_bits_wide() {
        for glyph in Glyph::ALL {
            assert!(glyph.bitmap().iter().all(|row| *row < 0b100000));
            assert_eq!(Glyph::identify(&glyph.bitmap()), Some(glyph));
        }
    }

    #[test]
    fn test_pad() {
        assert_eq!(pad("abc", 5), "abc  ");
        assert_eq!(pad("abcdef", 4), "abcd");
        assert_eq!(pad("°C", 3), "°C ");
        assert_eq!(pad("", 0), "");
    }

    #[test]
    fn test_out_of_range_glyph_slot_ignored() {
        let mut display = MemoryDisplay::new(1, 1);
        display.create_glyph(9, [0; 8]);
        assert!((0..GLYPH_SLOTS).all(|slot| display.glyph(slot).is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_locked_multi_row_writes_never_interleave() {
        let display = MemoryDisplay::new(4, 2);
        let panel = Panel::new(display.clone());

        let writers: Vec<_> = ["aaaa", "bbbb"]
            .into_iter()
            .map(|text| {
                let panel = panel.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let mut guard = panel.lock().await;
                        guard.write_at(0, 0, text);
                        tokio::task::yield_now().await;
                        guard.write_at(0, 1, text);
                        drop(guard);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            {
                let _guard = panel.lock().await;
                assert_eq!(display.row(0), display.row(1));
            }
            tokio::task::yield_now().await;
        }
        for writer in writers {
            writer.await.unwrap();
        }

        let _guard = panel.lock().await;
        assert_eq!(display.row(0), display.row(1));
        assert!(["aaaa", "bbbb"].contains(&display.row(0).as_str()));
    }
}
