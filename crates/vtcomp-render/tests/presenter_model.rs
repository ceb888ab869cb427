//! Presenter output replayed through a VT model must reproduce the root
//! surface exactly.

use proptest::prelude::*;
use vtcomp_core::capabilities::CapabilityTable;
use vtcomp_core::color::{Color, ColorDepth};
use vtcomp_core::geometry::{Rect, Size};
use vtcomp_render::cell::CellFormat;
use vtcomp_render::output::OutputChannel;
use vtcomp_render::presenter::Presenter;
use vtcomp_render::surface::Surface;
use vtcomp_render::terminal_model::TerminalModel;

struct Rig {
    root: Surface,
    presenter: Presenter,
    out: OutputChannel<Vec<u8>>,
    model: TerminalModel,
    seen: usize,
    colors: bool,
}

impl Rig {
    fn new(caps: CapabilityTable, width: u16, height: u16) -> Self {
        let model = TerminalModel::new(width, height, caps.flags());
        let colors = caps.color_depth() != ColorDepth::Mono;
        let mut root = Surface::create(Rect::from_size(width, height), Size::ZERO).expect("root");
        root.mark_all_dirty();
        Self {
            root,
            presenter: Presenter::new(caps, width, height),
            out: OutputChannel::new(Vec::new()),
            model,
            seen: 0,
            colors,
        }
    }

    /// Present, flush, and feed the new bytes to the model. Returns them.
    fn present(&mut self) -> Vec<u8> {
        self.presenter
            .present(&mut self.root, &mut self.out)
            .expect("present");
        self.out.flush().expect("flush");
        let fresh = self.out.writer()[self.seen..].to_vec();
        self.seen = self.out.writer().len();
        self.model.process(&fresh);
        fresh
    }

    /// Store a cell the way the compositor does: identical cells already on
    /// screen are left alone.
    fn put(&mut self, x: u16, y: u16, ch: char) {
        self.put_cell(x, y, CellFormat::from_char(ch));
    }

    fn put_cell(&mut self, x: u16, y: u16, cell: CellFormat) {
        if self
            .root
            .cell(x, y)
            .is_some_and(|old| old.attrs.is_printed() && *old == cell)
        {
            return;
        }
        // A wide glyph that does not fit is simply not written.
        self.root.put_cell(x, y, cell);
    }

    /// What the screen should show for row `y`: padding cells vanish behind
    /// their wide glyph, except that a wide glyph ending in the bottom-right
    /// corner is shown as an ellipsis and a blank.
    fn expected_row(&self, y: u16) -> Vec<(u16, CellFormat)> {
        let (w, h) = (self.root.width(), self.root.height());
        let row = self.root.row(y);
        let mut cells = Vec::new();
        let mut split = false;
        for (x, cell) in (0..w).zip(row.iter().copied()) {
            if cell.is_padding() {
                if split {
                    cells.push((x, CellFormat::BLANK.with_fg(cell.fg).with_bg(cell.bg)));
                }
                continue;
            }
            split = cell.is_wide() && y + 1 == h && x + 2 == w;
            if split {
                cells.push((x, CellFormat::from_char('…').with_fg(cell.fg).with_bg(cell.bg)));
            } else {
                cells.push((x, cell));
            }
        }
        cells
    }

    fn assert_in_sync(&self) {
        for y in 0..self.root.height() {
            let expected = self.expected_row(y);
            let text: String = expected.iter().map(|(_, c)| c.base()).collect();
            assert_eq!(
                self.model.row_text(y).as_deref(),
                Some(text.trim_end()),
                "row {y}"
            );
            if self.colors {
                for (x, cell) in expected {
                    let seen = self.model.cell(x, y).expect("model cell");
                    assert_eq!(seen.bg, cell.bg, "background at ({x}, {y})");
                }
            }
        }
    }
}

#[test]
fn blank_screen_then_text() {
    let mut rig = Rig::new(CapabilityTable::xterm(), 12, 3);
    rig.present();
    rig.assert_in_sync();

    for (i, ch) in "hello".chars().enumerate() {
        rig.put(3 + i as u16, 1, ch);
    }
    rig.present();
    rig.assert_in_sync();
    assert!(rig.present().is_empty());
}

#[test]
fn clear_to_end_of_line_scenario() {
    let mut rig = Rig::new(CapabilityTable::xterm(), 80, 2);
    for x in 0..80 {
        rig.put(x, 0, 'y');
    }
    rig.present();

    for x in 0..80 {
        rig.put(x, 0, if x < 40 { 'x' } else { ' ' });
    }
    let bytes = String::from_utf8(rig.present()).expect("utf8");
    assert_eq!(bytes.matches("\x1b[K").count(), 1);
    rig.assert_in_sync();
}

#[test]
fn bottom_right_cell_reaches_the_screen() {
    for caps in [CapabilityTable::xterm(), CapabilityTable::vt100(), CapabilityTable::linux_console()] {
        let mut rig = Rig::new(caps, 6, 2);
        for x in 0..6 {
            rig.put(x, 1, char::from(b'a' + x as u8));
        }
        rig.present();
        rig.assert_in_sync();
        assert_eq!(rig.model.scroll_count(), 0);
    }
}

#[test]
fn replacing_a_line_in_place() {
    let mut rig = Rig::new(CapabilityTable::xterm(), 30, 4);
    for (i, ch) in "the quick brown fox".chars().enumerate() {
        rig.put(i as u16, 2, ch);
    }
    rig.present();

    for (i, ch) in "the quick green fox".chars().enumerate() {
        rig.put(i as u16, 2, ch);
    }
    let bytes = rig.present();
    rig.assert_in_sync();
    // Only the changed word goes out, not the whole line.
    assert!(!String::from_utf8_lossy(&bytes).contains("quick"));
}

#[test]
fn wide_glyph_next_to_the_bottom_right_corner() {
    let mut rig = Rig::new(CapabilityTable::linux_console(), 12, 4);
    rig.present();
    rig.put(9, 3, '中');
    rig.put(11, 3, 'a');
    rig.present();
    assert_eq!(rig.model.row_text(3).as_deref(), Some("         中a"));
    assert_eq!(rig.model.scroll_count(), 0);
    rig.assert_in_sync();
    assert!(rig.present().is_empty());
}

#[test]
fn wide_glyph_split_by_the_corner() {
    for caps in [CapabilityTable::xterm(), CapabilityTable::vt100(), CapabilityTable::linux_console()] {
        let mut rig = Rig::new(caps, 8, 2);
        rig.put(6, 1, '中');
        rig.present();
        assert_eq!(rig.model.row_text(1).as_deref(), Some("      …"));
        assert_eq!(rig.model.scroll_count(), 0);
        rig.assert_in_sync();
    }
}

#[test]
fn colored_cells_reach_the_screen() {
    let mut rig = Rig::new(CapabilityTable::linux_console(), 10, 3);
    for x in 2..6 {
        rig.put_cell(x, 1, CellFormat::from_char(' ').with_bg(Color::BLUE));
    }
    rig.put_cell(9, 2, CellFormat::from_char('c').with_bg(Color::BLUE));
    rig.present();
    rig.assert_in_sync();
    assert_eq!(rig.model.cell(3, 1).map(|c| c.bg), Some(Color::BLUE));
    assert_eq!(rig.model.scroll_count(), 0);
}

#[derive(Debug, Clone, Copy)]
enum Paint {
    Char(char),
    Wide,
    Tinted,
}

impl Paint {
    fn cell(self) -> CellFormat {
        match self {
            Paint::Char(ch) => CellFormat::from_char(ch),
            Paint::Wide => CellFormat::from_char('中'),
            Paint::Tinted => CellFormat::from_char('c').with_bg(Color::BLUE),
        }
    }
}

fn frame_strategy(
    width: u16,
    height: u16,
) -> impl Strategy<Value = Vec<(u16, u16, Paint)>> {
    let paint = prop_oneof![
        6 => prop::sample::select(vec![' ', ' ', ' ', 'a', 'b', '=', '-', 'Z']).prop_map(Paint::Char),
        1 => Just(Paint::Wide),
        1 => Just(Paint::Tinted),
    ];
    prop::collection::vec((0..width, 0..height, paint), 0..120)
}

fn paint(rig: &mut Rig, frame: Vec<(u16, u16, Paint)>) {
    for (x, y, p) in frame {
        rig.put_cell(x, y, p.cell());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn replay_matches_root_xterm(
        first in frame_strategy(16, 5),
        second in frame_strategy(16, 5),
    ) {
        let mut rig = Rig::new(CapabilityTable::xterm(), 16, 5);
        paint(&mut rig, first);
        rig.present();
        rig.assert_in_sync();

        paint(&mut rig, second);
        rig.present();
        rig.assert_in_sync();
        prop_assert!(rig.present().is_empty());
        prop_assert_eq!(rig.model.scroll_count(), 0);
    }

    #[test]
    fn replay_matches_root_vt100(frame in frame_strategy(10, 4)) {
        let mut rig = Rig::new(CapabilityTable::vt100(), 10, 4);
        paint(&mut rig, frame);
        rig.present();
        rig.assert_in_sync();
        prop_assert_eq!(rig.model.scroll_count(), 0);
    }

    #[test]
    fn replay_matches_root_linux_console(
        first in frame_strategy(12, 4),
        second in frame_strategy(12, 4),
    ) {
        let mut rig = Rig::new(CapabilityTable::linux_console(), 12, 4);
        paint(&mut rig, first);
        rig.present();
        rig.assert_in_sync();

        paint(&mut rig, second);
        rig.present();
        rig.assert_in_sync();
        prop_assert!(rig.present().is_empty());
        prop_assert_eq!(rig.model.scroll_count(), 0);
    }
}
