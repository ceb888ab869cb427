//! End-to-end stacking scenarios: windows in, root surface and terminal
//! bytes out.

use vtcomp_core::capabilities::CapabilityTable;
use vtcomp_core::color::Color;
use vtcomp_core::geometry::{Point, Rect, Size};
use vtcomp_render::cell::{CellFormat, CompositeFlags};
use vtcomp_render::compositor::{Compositor, TerminalUpdates, WindowKind};
use vtcomp_render::config::CompositorConfig;
use vtcomp_render::surface_pool::SurfaceId;
use vtcomp_render::terminal_model::TerminalModel;

type Comp = Compositor<Vec<u8>>;

fn compositor(width: u16, height: u16) -> Comp {
    Compositor::new(Vec::new(), CapabilityTable::xterm(), width, height).expect("compositor")
}

fn window(comp: &mut Comp, rect: Rect, fill: char) -> SurfaceId {
    let id = comp
        .add_window(rect, Size::ZERO, WindowKind::Window)
        .expect("window");
    comp.surface_mut(id).expect("surface").clear(fill);
    comp.show_window(id).expect("show");
    id
}

fn root_text(comp: &Comp, y: u16) -> String {
    comp.root()
        .row(y)
        .iter()
        .filter(|c| !c.is_padding())
        .map(|c| c.base())
        .collect()
}

fn replay(comp: &Comp) -> TerminalModel {
    let caps = comp.presenter().capabilities();
    let (w, h) = (comp.root().width(), comp.root().height());
    let mut model = TerminalModel::new(w, h, caps.flags());
    model.process(comp.output().writer());
    model
}

#[test]
fn two_overlapping_windows() {
    let mut comp = compositor(10, 3);
    window(&mut comp, Rect::new(0, 0, 5, 3), 'A');
    window(&mut comp, Rect::new(3, 0, 5, 3), 'B');
    comp.force_update().expect("update");

    let model = replay(&comp);
    for y in 0..3 {
        assert_eq!(root_text(&comp, y), "AAABBBBB  ");
        assert_eq!(model.row_text(y).as_deref(), Some("AAABBBBB"));
    }
}

#[test]
fn coverage_follows_z_order_not_draw_order() {
    let mut comp = compositor(10, 1);
    let a = window(&mut comp, Rect::new(0, 0, 5, 1), 'A');
    let b = window(&mut comp, Rect::new(3, 0, 5, 1), 'B');
    comp.force_update().expect("update");

    // Redrawing the lower window must not punch through the upper one.
    comp.surface_mut(a).expect("a").clear('a');
    comp.force_update().expect("update");
    assert_eq!(root_text(&comp, 0), "aaaBBBBB  ");

    comp.raise_window(a).expect("raise");
    comp.surface_mut(b).expect("b").clear('b');
    comp.force_update().expect("update");
    assert_eq!(root_text(&comp, 0), "aaaaabbb  ");
    assert_eq!(replay(&comp).row_text(0).as_deref(), Some("aaaaabbb"));
}

#[test]
fn second_update_is_silent() {
    let mut comp = compositor(20, 4);
    let id = window(&mut comp, Rect::new(2, 1, 8, 2), '#');
    comp.surface_mut(id).expect("surface").print_str("status");
    comp.force_update().expect("update");
    let written = comp.output().writer().len();
    assert!(written > 0);

    comp.force_update().expect("update");
    assert_eq!(comp.output().writer().len(), written);

    // Same content again: still nothing new on the wire.
    comp.surface_mut(id).expect("surface").clear('#');
    comp.surface_mut(id).expect("surface").print_str("status");
    comp.force_update().expect("update");
    assert_eq!(comp.output().writer().len(), written);
}

#[test]
fn trailing_blanks_use_one_clear_to_eol() {
    let mut comp = compositor(80, 2);
    let id = window(&mut comp, Rect::new(0, 0, 80, 1), 'y');
    comp.force_update().expect("update");
    let before = comp.output().writer().len();

    let surface = comp.surface_mut(id).expect("surface");
    surface.clear(' ');
    surface.print_str(&"x".repeat(40));
    comp.force_update().expect("update");

    let fresh = String::from_utf8_lossy(&comp.output().writer()[before..]).into_owned();
    assert_eq!(fresh.matches("\x1b[K").count(), 1);
    assert_eq!(replay(&comp).row_text(0), Some("x".repeat(40)));
}

#[test]
fn transparency_round_trip() {
    let mut comp = compositor(8, 1);
    window(&mut comp, Rect::new(0, 0, 8, 1), 'z');
    comp.force_update().expect("update");
    let shown = root_text(&comp, 0);
    let written = comp.output().writer().len();

    let glass = comp
        .add_window(Rect::new(2, 0, 4, 1), Size::ZERO, WindowKind::Dialog)
        .expect("glass");
    comp.surface_mut(glass)
        .expect("surface")
        .fill(Rect::new(0, 0, 4, 1), CellFormat::TRANSPARENT);
    comp.show_window(glass).expect("show");
    comp.force_update().expect("update");

    assert_eq!(root_text(&comp, 0), shown);
    assert_eq!(comp.output().writer().len(), written);
}

#[test]
fn drop_shadow_tints_what_is_beneath() {
    let mut comp = compositor(10, 4);
    window(&mut comp, Rect::new(0, 0, 10, 4), 'm');

    let dialog = comp
        .add_window(Rect::new(1, 0, 4, 2), Size::new(2, 1), WindowKind::Dialog)
        .expect("dialog");
    let surface = comp.surface_mut(dialog).expect("surface");
    surface.clear('d');
    surface.draw_shadow(Color::DARK_GRAY, Color::BLACK);
    comp.show_window(dialog).expect("show");
    comp.force_update().expect("update");

    // Shadow column beside the second row, and the row below the dialog.
    let side = comp.root().cell(5, 1).copied().expect("cell");
    assert_eq!(side.base(), 'm');
    assert_eq!((side.fg, side.bg), (Color::DARK_GRAY, Color::BLACK));
    let below = comp.root().cell(4, 2).copied().expect("cell");
    assert_eq!((below.base(), below.bg), ('m', Color::BLACK));

    // Corner cells of the margin stay fully transparent.
    let corner = comp.root().cell(5, 0).copied().expect("cell");
    assert_eq!((corner.base(), corner.bg), ('m', Color::DEFAULT));
    let left = comp.root().cell(1, 2).copied().expect("cell");
    assert_eq!((left.base(), left.bg), ('m', Color::DEFAULT));
}

#[test]
fn overlay_window_shades_lower_windows_only_in_color() {
    let mut comp = compositor(6, 1);
    let base = window(&mut comp, Rect::new(0, 0, 6, 1), ' ');
    comp.surface_mut(base).expect("base").print_str("ab\u{2588}d");

    let shade = comp
        .add_window(Rect::new(0, 0, 6, 1), Size::ZERO, WindowKind::Tooltip)
        .expect("shade");
    let tint = CellFormat::BLANK
        .with_composite(CompositeFlags::COLOR_OVERLAY)
        .with_fg(Color::WHITE)
        .with_bg(Color::BLUE);
    comp.surface_mut(shade)
        .expect("shade")
        .fill(Rect::new(0, 0, 6, 1), tint);
    comp.show_window(shade).expect("show");
    comp.force_update().expect("update");

    assert_eq!(root_text(&comp, 0), "ab d  ");
    assert!(
        comp.root()
            .row(0)
            .iter()
            .all(|c| c.fg == Color::WHITE && c.bg == Color::BLUE)
    );
}

#[test]
fn hardware_cursor_follows_active_window() {
    let mut comp = compositor(20, 5);
    let a = window(&mut comp, Rect::new(0, 0, 10, 3), 'a');
    let b = window(&mut comp, Rect::new(12, 1, 6, 3), 'b');
    comp.surface_mut(a).expect("a").set_input_cursor(2, 1);
    comp.surface_mut(b).expect("b").set_input_cursor(0, 0);

    comp.set_active_window(Some(a)).expect("focus");
    comp.force_update().expect("update");
    assert_eq!(comp.hardware_cursor(), Some(Point::new(2, 1)));
    let model = replay(&comp);
    assert_eq!(model.cursor(), Point::new(2, 1));
    assert!(model.modes().cursor_visible);

    comp.set_active_window(Some(b)).expect("focus");
    comp.force_update().expect("update");
    assert_eq!(comp.hardware_cursor(), Some(Point::new(12, 1)));
}

#[test]
fn covered_input_cursor_is_hidden() {
    let mut comp = compositor(10, 3);
    let a = window(&mut comp, Rect::new(0, 0, 5, 3), 'a');
    window(&mut comp, Rect::new(0, 0, 3, 3), 'c');
    comp.surface_mut(a).expect("a").set_input_cursor(1, 1);
    comp.set_active_window(Some(a)).expect("focus");
    comp.force_update().expect("update");

    assert_eq!(comp.hardware_cursor(), None);
    assert!(!replay(&comp).modes().cursor_visible);
}

#[test]
fn resumed_updates_flush_the_backlog() {
    let mut comp = compositor(10, 2);
    comp.force_update().expect("update");
    let written = comp.output().writer().len();

    comp.set_terminal_updates(TerminalUpdates::Stop).expect("stop");
    window(&mut comp, Rect::new(0, 0, 4, 1), 'q');
    assert!(!comp.update_terminal().expect("update"));
    assert_eq!(comp.output().writer().len(), written);

    comp.set_terminal_updates(TerminalUpdates::Start).expect("start");
    assert_eq!(replay(&comp).row_text(0).as_deref(), Some("qqqq"));
}

#[test]
fn resize_and_redraw_repaint_everything() {
    let mut comp = compositor(6, 2);
    window(&mut comp, Rect::new(1, 0, 3, 2), 'w');
    comp.force_update().expect("update");

    comp.resize_terminal(8, 3).expect("resize");
    comp.force_update().expect("update");
    let mut model = TerminalModel::new(8, 3, comp.presenter().capabilities().flags());
    let before = comp.output().writer().len();
    comp.redraw_all();
    comp.force_update().expect("update");
    model.process(&comp.output().writer()[before..]);
    assert_eq!(model.row_text(0).as_deref(), Some(" www"));
    assert_eq!(model.row_text(1).as_deref(), Some(" www"));
    assert_eq!(model.row_text(2).as_deref(), Some(""));
}

#[test]
fn environment_settings_reach_the_output() {
    let config = CompositorConfig::from_lookup(|key| match key {
        "VTCOMP_OUTPUT_LIMIT" => Some("64".to_owned()),
        "VTCOMP_ENCODING" => Some("ascii".to_owned()),
        _ => None,
    });
    let mut comp = Compositor::with_config(Vec::new(), CapabilityTable::xterm(), 12, 2, &config)
        .expect("compositor");
    assert_eq!(comp.output().timer().limit(), 64);

    let id = comp
        .add_window(Rect::new(1, 0, 4, 1), Size::ZERO, WindowKind::Window)
        .expect("window");
    comp.surface_mut(id).expect("surface").clear('─');
    comp.show_window(id).expect("show");
    comp.force_update().expect("update");

    let bytes = String::from_utf8(comp.output().writer().clone()).expect("utf8");
    assert!(bytes.contains("----"), "{bytes:?}");
    assert!(!bytes.contains('─'));
}

#[test]
fn topmost_overlay_decides_the_tint() {
    let mut comp = compositor(6, 1);
    let base = window(&mut comp, Rect::new(0, 0, 6, 1), ' ');
    comp.surface_mut(base).expect("base").print_str("ab");

    for bg in [Color::BLUE, Color::RED] {
        let shade = comp
            .add_window(Rect::new(0, 0, 4, 1), Size::ZERO, WindowKind::Tooltip)
            .expect("shade");
        let tint = CellFormat::BLANK
            .with_composite(CompositeFlags::COLOR_OVERLAY)
            .with_fg(Color::WHITE)
            .with_bg(bg);
        comp.surface_mut(shade)
            .expect("shade")
            .fill(Rect::new(0, 0, 4, 1), tint);
        comp.show_window(shade).expect("show");
    }
    comp.force_update().expect("update");
    assert!(comp.root().row(0)[..4].iter().all(|c| c.bg == Color::RED));

    // Redrawing beneath both overlays keeps the same answer.
    let surface = comp.surface_mut(base).expect("base");
    surface.set_cursor(1, 1);
    surface.print_str("cd");
    comp.force_update().expect("update");
    assert_eq!(root_text(&comp, 0), "cd    ");
    assert!(comp.root().row(0)[..4].iter().all(|c| c.bg == Color::RED));
    assert_eq!(comp.root().cell(4, 0).map(|c| c.bg), Some(Color::DEFAULT));
}

#[test]
fn background_changes_show_through_inheriting_cells() {
    let mut comp = compositor(8, 1);
    let lower = window(&mut comp, Rect::new(0, 0, 8, 1), 'a');
    let upper = comp
        .add_window(Rect::new(2, 0, 3, 1), Size::ZERO, WindowKind::Window)
        .expect("upper");
    let inherit = CellFormat::from_char('X').with_composite(CompositeFlags::INHERIT_BACKGROUND);
    let surface = comp.surface_mut(upper).expect("upper");
    for x in 0..3 {
        surface.put_cell(x, 0, inherit);
    }
    comp.show_window(upper).expect("show");
    comp.force_update().expect("update");
    assert_eq!(root_text(&comp, 0), "aaXXXaaa");

    let surface = comp.surface_mut(lower).expect("lower");
    for x in 0..8 {
        surface.put_cell(x, 0, CellFormat::from_char('b').with_bg(Color::BLUE));
    }
    comp.force_update().expect("update");
    assert_eq!(root_text(&comp, 0), "bbXXXbbb");
    assert_eq!(comp.root().cell(3, 0).map(|c| c.bg), Some(Color::BLUE));
    assert_eq!(replay(&comp).cell(3, 0).map(|c| c.bg), Some(Color::BLUE));
}
