#![forbid(unsafe_code)]

//! Compositor: window surfaces → root surface → terminal.
//!
//! The [`Compositor`] owns the root surface (the image of the physical
//! screen), the desktop surface at the bottom of the stack, the arena of
//! window surfaces and the output path to the terminal.
//!
//! # Merge
//!
//! Windows are stacked in z-order, desktop first. For every dirty cell of a
//! window the compositor looks at the windows above that position:
//!
//! - an opaque cell above hides the position and the root is left alone,
//!   unless that cell inherits its background, in which case the whole
//!   stack is recomposited there;
//! - otherwise the window's effective cell is written, tinted by the
//!   topmost color-overlay cell above it, if any. Tints do not blend: the
//!   topmost one alone decides the colors.
//!
//! A window cell's own flags decide its effective value: transparent cells
//! show the composite beneath, color-overlay cells tint it, inherit-background
//! cells take its background, anything else is used as is.
//!
//! # Output
//!
//! [`Compositor::update_terminal`] merges every changed window, diffs the
//! root surface into the [`OutputChannel`] through the [`Presenter`] and
//! flushes when the adaptive timer allows it. Output is held back while a
//! draw pass is in progress or updates are stopped.
//!
//! ```
//! use vtcomp_core::capabilities::CapabilityTable;
//! use vtcomp_core::geometry::{Rect, Size};
//! use vtcomp_render::compositor::{Compositor, WindowKind};
//!
//! let mut comp = Compositor::new(Vec::new(), CapabilityTable::xterm(), 20, 5).unwrap();
//! let win = comp
//!     .add_window(Rect::new(2, 1, 6, 2), Size::ZERO, WindowKind::Window)
//!     .unwrap();
//! comp.surface_mut(win).unwrap().print_str("hello");
//! comp.show_window(win).unwrap();
//! comp.force_update().unwrap();
//! assert_eq!(comp.root().cell(2, 1).map(|c| c.base()), Some('h'));
//! ```

use std::io::{self, Write};
use std::time::Instant;

use smallvec::SmallVec;
use vtcomp_core::capabilities::CapabilityTable;
use vtcomp_core::geometry::{Point, Rect, Size};

use crate::cell::CellFormat;
use crate::config::CompositorConfig;
use crate::counting_writer::FlushStats;
use crate::output::OutputChannel;
use crate::presenter::Presenter;
use crate::surface::{Surface, SurfaceError};
use crate::surface_pool::{SurfaceId, SurfacePool};

// ── Errors ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CompositorError {
    /// The handle does not name a live surface.
    UnknownSurface(SurfaceId),
    /// A surface could not be allocated or resized.
    Surface(SurfaceError),
    /// Writing to the terminal failed.
    Io(io::Error),
}

impl std::fmt::Display for CompositorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSurface(id) => write!(f, "unknown surface {id}"),
            Self::Surface(err) => write!(f, "surface error: {err}"),
            Self::Io(err) => write!(f, "terminal write failed: {err}"),
        }
    }
}

impl std::error::Error for CompositorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnknownSurface(_) => None,
            Self::Surface(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<SurfaceError> for CompositorError {
    fn from(err: SurfaceError) -> Self {
        Self::Surface(err)
    }
}

impl From<io::Error> for CompositorError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

// ── Window roles ───────────────────────────────────────────────────────

/// What a surface is used for; decides its stacking band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Desktop,
    Window,
    Dialog,
    Menu,
    DropDown,
    Tooltip,
}

impl WindowKind {
    /// Stacking band. A window never rises above a higher band.
    #[inline]
    pub const fn band(self) -> u8 {
        match self {
            Self::Desktop => 0,
            Self::Window | Self::Dialog => 1,
            Self::Menu | Self::DropDown => 2,
            Self::Tooltip => 3,
        }
    }

    /// Popups stay above normal windows.
    #[inline]
    pub const fn is_popup(self) -> bool {
        self.band() >= 2
    }
}

/// Terminal output switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalUpdates {
    /// Merge, but write nothing to the terminal.
    Stop,
    /// Write again from the next update on.
    #[default]
    Continue,
    /// Write again and update the terminal now.
    Start,
}

/// Something that owns a surface and knows how to paint it.
pub trait SurfaceOwner {
    fn surface_id(&self) -> SurfaceId;

    fn draw(&mut self, surface: &mut Surface);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layer {
    id: SurfaceId,
    kind: WindowKind,
}

/// Coverage of one position by the windows above a layer.
enum Coverage {
    Visible,
    Shaded(CellFormat),
    Hidden,
}

// ── Compositor ─────────────────────────────────────────────────────────

pub struct Compositor<W: Write> {
    root: Surface,
    pool: SurfacePool,
    /// Bottom to top; `layers[0]` is the desktop.
    layers: Vec<Layer>,
    desktop: SurfaceId,
    active: Option<SurfaceId>,
    presenter: Presenter,
    out: OutputChannel<W>,
    drawing_in_progress: bool,
    updates: TerminalUpdates,
    hardware_cursor: Option<Point>,
}

impl<W: Write> std::fmt::Debug for Compositor<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("size", &(self.root.width(), self.root.height()))
            .field("layers", &self.layers.len())
            .field("active", &self.active)
            .field("drawing_in_progress", &self.drawing_in_progress)
            .field("updates", &self.updates)
            .finish_non_exhaustive()
    }
}

impl<W: Write> Compositor<W> {
    /// Compositor for a `width`×`height` terminal writing to `writer`,
    /// tuned by the `VTCOMP_*` environment ([`CompositorConfig::global`]).
    pub fn new(
        writer: W,
        caps: CapabilityTable,
        width: u16,
        height: u16,
    ) -> Result<Self, CompositorError> {
        Self::with_config(writer, caps, width, height, CompositorConfig::global())
    }

    pub fn with_config(
        writer: W,
        caps: CapabilityTable,
        width: u16,
        height: u16,
        config: &CompositorConfig,
    ) -> Result<Self, CompositorError> {
        let screen = Rect::from_size(width, height);
        let mut root = create_surface(screen, Size::ZERO)?;
        // Nothing is known about the screen yet: the first update paints it all.
        root.mark_all_dirty();
        let mut desktop_surface = create_surface(screen, Size::ZERO)?;
        desktop_surface.set_visible(true);

        let mut pool = SurfacePool::new();
        let desktop = pool.insert(desktop_surface);
        Ok(Self {
            root,
            pool,
            layers: vec![Layer {
                id: desktop,
                kind: WindowKind::Desktop,
            }],
            desktop,
            active: None,
            presenter: Presenter::with_config(caps, width, height, config),
            out: OutputChannel::with_config(writer, config),
            drawing_in_progress: false,
            updates: TerminalUpdates::Continue,
            hardware_cursor: None,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────────

    /// The image of the physical screen.
    #[inline]
    pub fn root(&self) -> &Surface {
        &self.root
    }

    #[inline]
    pub fn desktop(&self) -> SurfaceId {
        self.desktop
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.pool.get(id)
    }

    /// Mutable access for drawing. Changes reach the screen on the next
    /// merge.
    pub fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.pool.get_mut(id)
    }

    pub fn kind(&self, id: SurfaceId) -> Option<WindowKind> {
        self.layers.iter().find(|l| l.id == id).map(|l| l.kind)
    }

    /// Handles bottom to top.
    pub fn z_order(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.layers.iter().map(|l| l.id)
    }

    #[inline]
    pub fn active_window(&self) -> Option<SurfaceId> {
        self.active
    }

    #[inline]
    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut Presenter {
        &mut self.presenter
    }

    #[inline]
    pub fn output(&self) -> &OutputChannel<W> {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut OutputChannel<W> {
        &mut self.out
    }

    pub fn into_writer(self) -> W {
        self.out.into_inner()
    }

    /// Where the hardware cursor was put by the last update, if shown.
    #[inline]
    pub fn hardware_cursor(&self) -> Option<Point> {
        self.hardware_cursor
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.drawing_in_progress
    }

    #[inline]
    pub fn terminal_updates(&self) -> TerminalUpdates {
        self.updates
    }

    fn position(&self, id: SurfaceId) -> Result<usize, CompositorError> {
        match self.layers.iter().position(|l| l.id == id) {
            Some(pos) if self.pool.contains(id) => Ok(pos),
            _ => {
                vtcomp_core::warn!(surface = %id, "unknown surface handle");
                Err(CompositorError::UnknownSurface(id))
            }
        }
    }

    fn screen(&self) -> Rect {
        Rect::from_size(self.root.width(), self.root.height())
    }

    // ── Window management ──────────────────────────────────────────────

    /// Create a hidden window on top of its band.
    pub fn add_window(
        &mut self,
        geometry: Rect,
        shadow: Size,
        kind: WindowKind,
    ) -> Result<SurfaceId, CompositorError> {
        let surface = create_surface(geometry, shadow)?;
        let id = self.pool.insert(surface);
        let at = self.top_of_band(kind.band());
        self.layers.insert(at, Layer { id, kind });
        vtcomp_core::debug!(surface = %id, ?kind, "window added");
        Ok(id)
    }

    /// Drop a window and repaint what it covered.
    pub fn remove_window(&mut self, id: SurfaceId) -> Result<Surface, CompositorError> {
        if id == self.desktop {
            return Err(CompositorError::UnknownSurface(id));
        }
        let pos = self.position(id)?;
        self.layers.remove(pos);
        let surface = self
            .pool
            .remove(id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        if self.active == Some(id) {
            self.active = None;
        }
        if surface.is_visible() {
            self.restore_region(surface.full_geometry());
        }
        Ok(surface)
    }

    pub fn move_window(&mut self, id: SurfaceId, to: Point) -> Result<(), CompositorError> {
        self.position(id)?;
        let surface = self
            .pool
            .get_mut(id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        let before = surface.full_geometry();
        surface.set_offset(to);
        let after = surface.full_geometry();
        if surface.is_visible() {
            self.restore_region(before.union(&after));
        }
        Ok(())
    }

    /// Change a window's geometry. The content is reset when the size
    /// changes; on failure the window is left as it was.
    pub fn resize_window(
        &mut self,
        id: SurfaceId,
        geometry: Rect,
        shadow: Size,
    ) -> Result<(), CompositorError> {
        self.position(id)?;
        let surface = self
            .pool
            .get_mut(id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        let before = surface.full_geometry();
        if let Err(err) = surface.resize(geometry, shadow) {
            vtcomp_core::error!(surface = %id, error = %err, "window resize failed");
            return Err(err.into());
        }
        let after = surface.full_geometry();
        if surface.is_visible() {
            self.restore_region(before.union(&after));
        }
        Ok(())
    }

    pub fn show_window(&mut self, id: SurfaceId) -> Result<(), CompositorError> {
        self.set_visible(id, true)
    }

    pub fn hide_window(&mut self, id: SurfaceId) -> Result<(), CompositorError> {
        self.set_visible(id, false)
    }

    fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<(), CompositorError> {
        self.position(id)?;
        let surface = self
            .pool
            .get_mut(id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        if surface.is_visible() == visible {
            return Ok(());
        }
        surface.set_visible(visible);
        surface.reset_changes();
        let area = surface.full_geometry();
        self.restore_region(area);
        Ok(())
    }

    /// Put a window on top of its band.
    pub fn raise_window(&mut self, id: SurfaceId) -> Result<(), CompositorError> {
        let pos = self.position(id)?;
        let layer = self.layers.remove(pos);
        let at = self.top_of_band(layer.kind.band());
        self.layers.insert(at, layer);
        if at != pos {
            self.restore_layer_area(id);
        }
        Ok(())
    }

    /// Put a window at the bottom of its band, never below the desktop.
    pub fn lower_window(&mut self, id: SurfaceId) -> Result<(), CompositorError> {
        if id == self.desktop {
            return Ok(());
        }
        let pos = self.position(id)?;
        let layer = self.layers.remove(pos);
        let band = layer.kind.band();
        let at = self
            .layers
            .iter()
            .position(|l| l.id != self.desktop && l.kind.band() >= band)
            .unwrap_or(self.layers.len())
            .max(1);
        self.layers.insert(at, layer);
        if at != pos {
            self.restore_layer_area(id);
        }
        Ok(())
    }

    fn top_of_band(&self, band: u8) -> usize {
        self.layers
            .iter()
            .position(|l| l.kind.band() > band)
            .unwrap_or(self.layers.len())
            .max(1)
    }

    fn restore_layer_area(&mut self, id: SurfaceId) {
        if let Some(surface) = self.pool.get(id)
            && surface.is_visible()
        {
            let area = surface.full_geometry();
            self.restore_region(area);
        }
    }

    /// Focus a window; its input cursor drives the hardware cursor.
    pub fn set_active_window(&mut self, id: Option<SurfaceId>) -> Result<(), CompositorError> {
        if let Some(id) = id {
            self.position(id)?;
        }
        self.active = id;
        Ok(())
    }

    /// Topmost visible window whose content covers `at`.
    pub fn window_at(&self, at: Point) -> Option<SurfaceId> {
        self.layers.iter().rev().map(|l| l.id).find(|&id| {
            self.pool
                .get(id)
                .is_some_and(|s| s.is_visible() && s.geometry().contains(at.x, at.y))
        })
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Cell of layer `pos` at terminal `(tx, ty)` after its own flags are
    /// applied. `None` when the layer is hidden or does not reach there.
    fn effective(&self, pos: usize, tx: u16, ty: u16) -> Option<CellFormat> {
        let surface = self.pool.get(self.layers[pos].id)?;
        if !surface.is_visible() {
            return None;
        }
        let origin = surface.offset();
        let lx = tx.checked_sub(origin.x)?;
        let ly = ty.checked_sub(origin.y)?;
        let cell = *surface.cell(lx, ly)?;

        Some(if cell.is_color_overlay() {
            self.beneath(pos, tx, ty).tinted_by(&cell)
        } else if cell.is_transparent() {
            self.beneath(pos, tx, ty)
        } else if cell.inherits_background() {
            cell.with_bg(self.beneath(pos, tx, ty).bg)
        } else {
            cell
        })
    }

    /// Composite of every layer below `pos` at `(tx, ty)`.
    fn beneath(&self, pos: usize, tx: u16, ty: u16) -> CellFormat {
        (0..pos)
            .rev()
            .find_map(|p| self.effective(p, tx, ty))
            .unwrap_or(CellFormat::BLANK)
    }

    /// How the windows above `pos` treat `(tx, ty)`: hidden by any opaque
    /// cell, otherwise shaded by the topmost color-overlay cell.
    fn coverage(&self, pos: usize, tx: u16, ty: u16) -> Coverage {
        let above: SmallVec<[CellFormat; 8]> = self.layers[pos + 1..]
            .iter()
            .filter_map(|l| {
                let s = self.pool.get(l.id)?;
                if !s.is_visible() {
                    return None;
                }
                let o = s.offset();
                s.cell(tx.checked_sub(o.x)?, ty.checked_sub(o.y)?).copied()
            })
            .collect();
        if above.iter().any(CellFormat::is_opaque) {
            return Coverage::Hidden;
        }
        match above.iter().rev().find(|c| c.is_color_overlay()) {
            Some(tint) => Coverage::Shaded(*tint),
            None => Coverage::Visible,
        }
    }

    /// Whether some window above `pos` has a cell at `(tx, ty)` that reads
    /// the layers beneath it. Rows without such cells are skipped outright.
    fn shows_through_above(&self, pos: usize, tx: u16, ty: u16) -> bool {
        self.layers[pos + 1..].iter().any(|l| {
            let Some(s) = self.pool.get(l.id).filter(|s| s.is_visible()) else {
                return false;
            };
            let o = s.offset();
            let (Some(lx), Some(ly)) = (tx.checked_sub(o.x), ty.checked_sub(o.y)) else {
                return false;
            };
            s.row_reads_beneath(ly) && s.cell(lx, ly).is_some_and(CellFormat::reads_beneath)
        })
    }

    /// What layer `pos` contributes at `(tx, ty)` after the topmost
    /// overlay above has tinted it, or `None` when a higher window hides it.
    fn resolve(&self, pos: usize, tx: u16, ty: u16) -> Option<CellFormat> {
        match self.coverage(pos, tx, ty) {
            Coverage::Hidden => None,
            Coverage::Shaded(tint) => self.effective(pos, tx, ty).map(|c| c.tinted_by(&tint)),
            Coverage::Visible => self.effective(pos, tx, ty),
        }
    }

    /// Store a composited cell in the root surface.
    fn write_root(&mut self, tx: u16, ty: u16, cell: CellFormat) {
        let Some(old) = self.root.cell(tx, ty).copied() else {
            return;
        };
        let mut new = cell.resolved();
        let unchanged = old.attrs.is_printed() && old == new;
        new.attrs = new.attrs.with_printed(unchanged).with_no_changes(unchanged);
        if let Some(slot) = self.root.row_mut(ty).get_mut(usize::from(tx)) {
            *slot = new;
        }
        self.root.mark_dirty(ty, tx);
    }

    // ── Merge ──────────────────────────────────────────────────────────

    /// Recompute the root surface over `area` from the whole stack.
    pub fn restore_region(&mut self, area: Rect) {
        let area = self.screen().intersection(&area);
        let top = self.layers.len();
        for ty in area.y..area.bottom() {
            for tx in area.x..area.right() {
                let cell = self.beneath(top, tx, ty);
                self.write_root(tx, ty, cell);
            }
        }
    }

    /// Merge one window into the root surface now.
    pub fn put_area(&mut self, id: SurfaceId) -> Result<usize, CompositorError> {
        let pos = self.position(id)?;
        Ok(self.merge_layer(pos))
    }

    fn merge_layer(&mut self, pos: usize) -> usize {
        let id = self.layers[pos].id;
        let Some(surface) = self.pool.get(id) else {
            return 0;
        };
        if !surface.is_visible() || !surface.has_changes() {
            return 0;
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("merge_window", surface = %id, pos).entered();

        let origin = surface.offset();
        let last_col = surface.full_width().saturating_sub(1);
        let spans: Vec<(u16, u16, u16)> = surface
            .changes()
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_clean())
            .map(|(y, line)| (y as u16, line.xmin, line.xmax.min(last_col)))
            .collect();

        let (width, height) = (self.root.width(), self.root.height());
        let mut written = 0;
        for (y, xmin, xmax) in spans {
            let Some(ty) = origin.y.checked_add(y).filter(|&ty| ty < height) else {
                continue;
            };
            for x in xmin..=xmax {
                let Some(tx) = origin.x.checked_add(x).filter(|&tx| tx < width) else {
                    break;
                };
                let cell = match self.resolve(pos, tx, ty) {
                    Some(cell) => cell,
                    // Hidden, but a cell above still takes its background
                    // from below: recomposite the whole stack there.
                    None if self.shows_through_above(pos, tx, ty) => {
                        self.beneath(self.layers.len(), tx, ty)
                    }
                    None => continue,
                };
                self.write_root(tx, ty, cell);
                written += 1;
            }
        }

        if let Some(surface) = self.pool.get_mut(id) {
            surface.reset_changes();
        }
        written
    }

    /// Merge every visible window with pending changes, bottom to top.
    pub fn merge_all(&mut self) -> usize {
        (0..self.layers.len()).map(|pos| self.merge_layer(pos)).sum()
    }

    // ── Drawing ────────────────────────────────────────────────────────

    /// Let `owner` paint its surface, then merge it.
    pub fn draw(&mut self, owner: &mut dyn SurfaceOwner) -> Result<usize, CompositorError> {
        let id = owner.surface_id();
        self.position(id)?;
        let surface = self
            .pool
            .get_mut(id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        self.drawing_in_progress = true;
        owner.draw(surface);
        self.drawing_in_progress = false;
        self.put_area(id)
    }

    /// Hold terminal output back until [`end_draw`](Self::end_draw).
    pub fn begin_draw(&mut self) {
        self.drawing_in_progress = true;
    }

    pub fn end_draw(&mut self) {
        self.drawing_in_progress = false;
    }

    // ── Terminal output ────────────────────────────────────────────────

    pub fn set_terminal_updates(&mut self, mode: TerminalUpdates) -> Result<(), CompositorError> {
        self.updates = mode;
        if mode == TerminalUpdates::Start {
            self.updates = TerminalUpdates::Continue;
            self.force_update()?;
        }
        Ok(())
    }

    fn output_allowed(&self) -> bool {
        !self.drawing_in_progress && self.updates != TerminalUpdates::Stop
    }

    /// Merge, present, and flush if the adaptive timer says so. Returns
    /// whether anything reached the terminal.
    pub fn update_terminal(&mut self) -> Result<bool, CompositorError> {
        self.update_terminal_at(Instant::now())
    }

    pub fn update_terminal_at(&mut self, now: Instant) -> Result<bool, CompositorError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("update_terminal").entered();

        self.merge_all();
        if !self.output_allowed() {
            return Ok(false);
        }
        self.present()?;
        Ok(self.out.flush_if_due(now)?.is_some())
    }

    /// Merge, present and flush regardless of the timer.
    pub fn force_update(&mut self) -> Result<Option<FlushStats>, CompositorError> {
        self.merge_all();
        if !self.output_allowed() {
            return Ok(None);
        }
        self.present()?;
        Ok(Some(self.out.flush()?))
    }

    /// Write pending output if the timer allows it at `now`.
    pub fn flush_if_due(&mut self, now: Instant) -> Result<Option<FlushStats>, CompositorError> {
        if !self.output_allowed() {
            return Ok(None);
        }
        Ok(self.out.flush_if_due(now)?)
    }

    fn present(&mut self) -> io::Result<()> {
        self.presenter.present(&mut self.root, &mut self.out)?;
        self.hardware_cursor = self.input_cursor();
        match self.hardware_cursor {
            Some(at) => {
                if !self.presenter.show_cursor_at(at, &mut self.out)? {
                    self.hardware_cursor = None;
                }
            }
            None => self.presenter.hide_cursor(&mut self.out)?,
        }
        Ok(())
    }

    /// Hardware cursor position: the focused window's input cursor when it
    /// lies inside that window and the screen and no higher window hides
    /// it. Without focus, the highest window asking for it.
    fn input_cursor(&self) -> Option<Point> {
        let mut chosen = None;
        for (pos, layer) in self.layers.iter().enumerate() {
            if self.active.is_some_and(|active| active != layer.id) {
                continue;
            }
            let Some(surface) = self.pool.get(layer.id) else {
                continue;
            };
            let Some(local) = surface.input_cursor() else {
                continue;
            };
            if !surface.is_visible() || local.x >= surface.width() || local.y >= surface.height() {
                continue;
            }
            let origin = surface.offset();
            let (Some(tx), Some(ty)) = (origin.x.checked_add(local.x), origin.y.checked_add(local.y))
            else {
                continue;
            };
            if !self.screen().contains(tx, ty) {
                continue;
            }
            if matches!(self.coverage(pos, tx, ty), Coverage::Hidden) {
                continue;
            }
            chosen = Some(Point::new(tx, ty));
        }
        chosen
    }

    /// Mark every root cell unprinted so the next update repaints the
    /// whole screen.
    pub fn redraw_all(&mut self) {
        for y in 0..self.root.height() {
            for cell in self.root.row_mut(y) {
                cell.attrs = cell.attrs.with_printed(false).with_no_changes(false);
            }
        }
        self.root.mark_all_dirty();
        self.presenter.reset();
    }

    /// Adopt a new terminal size: root and desktop are rebuilt and the
    /// whole screen is recomposited.
    pub fn resize_terminal(&mut self, width: u16, height: u16) -> Result<(), CompositorError> {
        let screen = Rect::from_size(width, height);
        let mut root = create_surface(screen, Size::ZERO)?;
        let desktop = self
            .pool
            .get_mut(self.desktop)
            .ok_or(CompositorError::UnknownSurface(self.desktop))?;
        desktop.resize(screen, Size::ZERO)?;
        desktop.reset_changes();
        root.mark_all_dirty();
        self.root = root;

        self.presenter.set_term_size(width, height);
        self.presenter.reset();
        self.restore_region(screen);
        vtcomp_core::debug!(width, height, "terminal resized");
        Ok(())
    }

    pub fn enter_alternate_screen(&mut self) -> Result<bool, CompositorError> {
        let entered = self.presenter.enter_alternate_screen(&mut self.out)?;
        if entered {
            self.redraw_all();
        }
        Ok(entered)
    }

    pub fn leave_alternate_screen(&mut self) -> Result<bool, CompositorError> {
        let left = self.presenter.leave_alternate_screen(&mut self.out)?;
        self.out.flush()?;
        Ok(left)
    }
}

fn create_surface(geometry: Rect, shadow: Size) -> Result<Surface, CompositorError> {
    Surface::create(geometry, shadow).map_err(|err| {
        vtcomp_core::error!(error = %err, "surface allocation failed");
        CompositorError::Surface(err)
    })
}
