#![forbid(unsafe_code)]

//! Window surfaces.
//!
//! A [`Surface`] is a rectangular grid of [`CellFormat`]s owned by one
//! window, plus an optional drop-shadow margin on the right and bottom. Each
//! row carries a [`LineChanges`] record: the dirty column span pending
//! compositing and the number of cells that need the layers beneath them.
//!
//! # Layout
//!
//! Cells are stored row-major over the *full* size, shadow included:
//! `index = y * full_width + x`.
//!
//! # Invariants
//!
//! 1. `cells.len() == full_width * full_height`
//! 2. A dirty span only widens until [`Surface::reset_changes`]
//! 3. A cell flagged `fullwidth_padding` always follows a width-2 cell
//! 4. `trans_count` equals the number of cells in the row that read beneath

use unicode_segmentation::UnicodeSegmentation;
use vtcomp_core::color::Color;
use vtcomp_core::geometry::{Point, Rect, Size};

use crate::cell::{CellFormat, CompositeFlags, MAX_CODEPOINTS, StyleFlags};

/// Pending changes of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChanges {
    /// First dirty column (inclusive).
    pub xmin: u16,
    /// Last dirty column (inclusive).
    pub xmax: u16,
    /// Cells in this row that are transparent, tinting or inheriting.
    pub trans_count: u16,
}

impl LineChanges {
    /// No pending change.
    pub const CLEAN: Self = Self {
        xmin: u16::MAX,
        xmax: 0,
        trans_count: 0,
    };

    #[inline]
    pub const fn is_clean(&self) -> bool {
        self.xmin > self.xmax
    }

    /// Widen the span to cover `xmin..=xmax`.
    #[inline]
    pub fn widen(&mut self, xmin: u16, xmax: u16) {
        self.xmin = self.xmin.min(xmin);
        self.xmax = self.xmax.max(xmax);
    }

    /// Forget the span, keep the transparency count.
    #[inline]
    pub fn reset(&mut self) {
        self.xmin = u16::MAX;
        self.xmax = 0;
    }
}

impl Default for LineChanges {
    fn default() -> Self {
        Self::CLEAN
    }
}

/// Outcome of [`Surface::print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStatus {
    /// The cell was written and there is room for more.
    Printed,
    /// The cursor ran past the last row; stop printing.
    EndOfSurface,
}

/// Failure to allocate a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The cell array could not be reserved.
    Allocation { cells: usize },
    /// Width or height plus shadow overflows the coordinate range.
    TooLarge { width: u16, height: u16 },
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocation { cells } => {
                write!(f, "could not allocate a surface of {cells} cells")
            }
            Self::TooLarge { width, height } => {
                write!(f, "surface of {width}x{height} plus shadow is too large")
            }
        }
    }
}

impl std::error::Error for SurfaceError {}

fn allocate(size: Size, shadow: Size) -> Result<(Vec<CellFormat>, Vec<LineChanges>), SurfaceError> {
    let too_large = SurfaceError::TooLarge {
        width: size.width,
        height: size.height,
    };
    let full_w = size.width.checked_add(shadow.width).ok_or(too_large.clone())?;
    let full_h = size.height.checked_add(shadow.height).ok_or(too_large)?;
    let total = full_w as usize * full_h as usize;

    let mut cells = Vec::new();
    cells
        .try_reserve_exact(total)
        .map_err(|_| SurfaceError::Allocation { cells: total })?;
    let mut changes = Vec::new();
    changes
        .try_reserve_exact(full_h as usize)
        .map_err(|_| SurfaceError::Allocation { cells: total })?;

    for y in 0..full_h {
        let mut line = LineChanges::CLEAN;
        for x in 0..full_w {
            let in_shadow = x >= size.width || y >= size.height;
            if in_shadow {
                cells.push(CellFormat::TRANSPARENT);
                line.trans_count += 1;
            } else {
                cells.push(CellFormat::BLANK);
            }
        }
        changes.push(line);
    }
    Ok((cells, changes))
}

/// A window's cell buffer.
///
/// # Example
///
/// ```
/// use vtcomp_core::geometry::{Rect, Size};
/// use vtcomp_render::surface::{PrintStatus, Surface};
///
/// let mut surface = Surface::create(Rect::new(0, 0, 4, 1), Size::ZERO).unwrap();
/// assert_eq!(surface.print_str("hi"), PrintStatus::Printed);
/// assert_eq!(surface.cell(1, 0).map(|c| c.base()), Some('i'));
/// ```
#[derive(Debug, Clone)]
pub struct Surface {
    offset: Point,
    size: Size,
    shadow: Size,
    cells: Vec<CellFormat>,
    changes: Vec<LineChanges>,
    /// Sequential write position, 1-based.
    cursor: Point,
    /// Hardware cursor request in local content coordinates.
    input_cursor: Option<Point>,
    pen: CellFormat,
    visible: bool,
    has_changes: bool,
}

impl Surface {
    /// Allocate a surface at `geometry` with a `shadow` margin.
    ///
    /// Content cells start blank; shadow cells start transparent.
    pub fn create(geometry: Rect, shadow: Size) -> Result<Self, SurfaceError> {
        let size = geometry.size();
        let (cells, changes) = allocate(size, shadow)?;
        Ok(Self {
            offset: geometry.origin(),
            size,
            shadow,
            cells,
            changes,
            cursor: Point::new(1, 1),
            input_cursor: None,
            pen: CellFormat::BLANK,
            visible: false,
            has_changes: false,
        })
    }

    /// Change placement and size.
    ///
    /// A pure move keeps the content. Any size change resets every cell and
    /// every dirty span; the allocation is reused when the total cell count
    /// is unchanged. On error the surface is left as it was.
    pub fn resize(&mut self, geometry: Rect, shadow: Size) -> Result<(), SurfaceError> {
        let size = geometry.size();
        if size == self.size && shadow == self.shadow {
            self.offset = geometry.origin();
            return Ok(());
        }

        let total = (size.width as usize + shadow.width as usize)
            * (size.height as usize + shadow.height as usize);
        if total == self.cells.len() && size.width.checked_add(shadow.width).is_some() {
            let full_w = size.width + shadow.width;
            let full_h = size.height.checked_add(shadow.height).ok_or(SurfaceError::TooLarge {
                width: size.width,
                height: size.height,
            })?;
            for (i, cell) in self.cells.iter_mut().enumerate() {
                let x = (i % full_w as usize) as u16;
                let y = (i / full_w as usize) as u16;
                *cell = if x >= size.width || y >= size.height {
                    CellFormat::TRANSPARENT
                } else {
                    CellFormat::BLANK
                };
            }
            self.changes.clear();
            self.changes.extend((0..full_h).map(|y| LineChanges {
                trans_count: if y >= size.height { full_w } else { shadow.width },
                ..LineChanges::CLEAN
            }));
        } else {
            let (cells, changes) = allocate(size, shadow)?;
            self.cells = cells;
            self.changes = changes;
        }

        self.offset = geometry.origin();
        self.size = size;
        self.shadow = shadow;
        self.cursor = Point::new(1, 1);
        self.has_changes = false;
        Ok(())
    }

    // ── Geometry ───────────────────────────────────────────────────────

    /// Content width (shadow excluded).
    #[inline]
    pub const fn width(&self) -> u16 {
        self.size.width
    }

    /// Content height (shadow excluded).
    #[inline]
    pub const fn height(&self) -> u16 {
        self.size.height
    }

    #[inline]
    pub const fn full_width(&self) -> u16 {
        self.size.width + self.shadow.width
    }

    #[inline]
    pub const fn full_height(&self) -> u16 {
        self.size.height + self.shadow.height
    }

    #[inline]
    pub const fn shadow(&self) -> Size {
        self.shadow
    }

    #[inline]
    pub const fn offset(&self) -> Point {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    /// Content rectangle in terminal coordinates.
    #[inline]
    pub const fn geometry(&self) -> Rect {
        Rect::at(self.offset, self.size)
    }

    /// Rectangle including the shadow margin, in terminal coordinates.
    #[inline]
    pub const fn full_geometry(&self) -> Rect {
        Rect::new(self.offset.x, self.offset.y, self.full_width(), self.full_height())
    }

    #[inline]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    #[inline]
    pub const fn has_changes(&self) -> bool {
        self.has_changes
    }

    // ── Cell access ────────────────────────────────────────────────────

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.full_width() && y < self.full_height() {
            Some(y as usize * self.full_width() as usize + x as usize)
        } else {
            None
        }
    }

    /// Cell at local `(x, y)`, shadow included.
    #[inline]
    pub fn cell(&self, x: u16, y: u16) -> Option<&CellFormat> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// One full row, shadow included.
    pub fn row(&self, y: u16) -> &[CellFormat] {
        let w = self.full_width() as usize;
        let start = y as usize * w;
        self.cells.get(start..start + w).unwrap_or(&[])
    }

    /// Mutable access to one full row. Callers own dirty tracking.
    pub fn row_mut(&mut self, y: u16) -> &mut [CellFormat] {
        let w = self.full_width() as usize;
        let start = y as usize * w;
        self.cells.get_mut(start..start + w).unwrap_or(&mut [])
    }

    pub fn cells(&self) -> &[CellFormat] {
        &self.cells
    }

    // ── Dirty tracking ─────────────────────────────────────────────────

    /// Per-row change records.
    pub fn changes(&self) -> &[LineChanges] {
        &self.changes
    }

    #[inline]
    pub fn line_changes(&self, y: u16) -> Option<&LineChanges> {
        self.changes.get(y as usize)
    }

    /// Whether row `y` holds any cell that needs the layers beneath it.
    #[inline]
    pub fn row_reads_beneath(&self, y: u16) -> bool {
        self.changes
            .get(y as usize)
            .is_some_and(|line| line.trans_count > 0)
    }

    /// Mark a single column of `row` dirty.
    #[inline]
    pub fn mark_dirty(&mut self, row: u16, x: u16) {
        self.mark_dirty_range(row, x, x);
    }

    /// Widen the dirty span of `row` to cover `xmin..=xmax`.
    pub fn mark_dirty_range(&mut self, row: u16, xmin: u16, xmax: u16) {
        let last = self.full_width().saturating_sub(1);
        if xmin > xmax || self.full_width() == 0 {
            return;
        }
        if let Some(line) = self.changes.get_mut(row as usize) {
            line.widen(xmin.min(last), xmax.min(last));
            self.has_changes = true;
        }
    }

    /// Mark whole rows `top..=bottom` dirty.
    ///
    /// List-style widgets use this after moving a highlight instead of
    /// guessing which single rows changed.
    pub fn mark_rows_dirty(&mut self, top: u16, bottom: u16) {
        let last_col = self.full_width().saturating_sub(1);
        let last_row = self.full_height().saturating_sub(1);
        for row in top..=bottom.min(last_row) {
            self.mark_dirty_range(row, 0, last_col);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.mark_rows_dirty(0, self.full_height().saturating_sub(1));
    }

    /// Forget all pending spans after they were composited.
    pub fn reset_changes(&mut self) {
        for line in &mut self.changes {
            line.reset();
        }
        self.has_changes = false;
    }

    // ── Writing ────────────────────────────────────────────────────────

    /// Current sequential write position (1-based).
    #[inline]
    pub const fn cursor(&self) -> Point {
        self.cursor
    }

    /// Set the sequential write position (1-based, content relative).
    pub fn set_cursor(&mut self, x: u16, y: u16) {
        self.cursor = Point::new(x.max(1), y.max(1));
    }

    /// Colors and style applied by [`print_str`](Self::print_str) and
    /// [`clear`](Self::clear).
    #[inline]
    pub const fn pen(&self) -> CellFormat {
        self.pen
    }

    pub fn set_pen(&mut self, fg: Color, bg: Color, style: StyleFlags) {
        self.pen = CellFormat::BLANK.with_fg(fg).with_bg(bg).with_style(style);
    }

    /// Set composite flags on the pen (e.g. to print transparent text).
    pub fn set_pen_composite(&mut self, flags: CompositeFlags) {
        self.pen = self.pen.with_composite(flags);
    }

    /// Store one cell, keeping wide pairs and `trans_count` consistent.
    fn write_cell(&mut self, x: u16, y: u16, cell: CellFormat) {
        let Some(idx) = self.index(x, y) else { return };
        let old = self.cells[idx];

        if old.is_wide()
            && let Some(tail) = self.index(x + 1, y)
            && self.cells[tail].is_padding()
        {
            self.replace_cell(tail, x + 1, y, CellFormat::BLANK.with_fg(old.fg).with_bg(old.bg));
        } else if old.is_padding()
            && !cell.is_padding()
            && x > 0
            && let Some(head) = self.index(x - 1, y)
            && self.cells[head].is_wide()
        {
            let base = self.cells[head];
            self.replace_cell(head, x - 1, y, CellFormat::BLANK.with_fg(base.fg).with_bg(base.bg));
        }

        self.replace_cell(idx, x, y, cell);
    }

    fn replace_cell(&mut self, idx: usize, x: u16, y: u16, cell: CellFormat) {
        let was = self.cells[idx].reads_beneath();
        let now = cell.reads_beneath();
        let line = &mut self.changes[y as usize];
        match (was, now) {
            (false, true) => line.trans_count += 1,
            (true, false) => line.trans_count = line.trans_count.saturating_sub(1),
            _ => {}
        }
        self.cells[idx] = cell;
        self.mark_dirty(y, x);
    }

    /// Write `cell` at local `(x, y)`.
    ///
    /// A width-2 cell also writes its padding companion; if the pair does not
    /// fit, nothing is written. Returns whether the write happened.
    pub fn put_cell(&mut self, x: u16, y: u16, cell: CellFormat) -> bool {
        if self.index(x, y).is_none() {
            return false;
        }
        if cell.is_wide() {
            if x.checked_add(1).and_then(|tx| self.index(tx, y)).is_none() {
                return false;
            }
            self.write_cell(x, y, cell);
            self.write_cell(x + 1, y, cell.padding());
        } else {
            self.write_cell(x, y, cell);
        }
        true
    }

    /// Write `cell` at the cursor and advance it.
    ///
    /// The cursor wraps after the last column (shadow included). A width-2
    /// cell is followed by its padding cell; if only one column is left it is
    /// written as a space instead. Returns
    /// [`PrintStatus::EndOfSurface`] once the cursor leaves the last row; the
    /// cursor is then parked back on that row.
    pub fn print(&mut self, cell: CellFormat) -> PrintStatus {
        let full_w = self.full_width();
        let full_h = self.full_height();
        if full_w == 0 || full_h == 0 {
            return PrintStatus::EndOfSurface;
        }
        let ax = self.cursor.x - 1;
        let ay = self.cursor.y - 1;

        if ax < full_w && ay < full_h {
            if cell.is_wide() && ax + 1 >= full_w {
                let mut blank = CellFormat::BLANK.with_fg(cell.fg).with_bg(cell.bg);
                blank.attrs = blank.attrs.with_style(cell.attrs.style());
                self.write_cell(ax, ay, blank);
                self.cursor.x += 1;
            } else if cell.is_wide() {
                self.write_cell(ax, ay, cell);
                self.write_cell(ax + 1, ay, cell.padding());
                self.cursor.x += 2;
            } else {
                self.write_cell(ax, ay, cell);
                self.cursor.x += 1;
            }
            self.has_changes = true;
        } else {
            self.cursor.x = self.cursor.x.saturating_add(1);
        }

        if self.cursor.x > full_w {
            self.cursor.x = 1;
            self.cursor.y = self.cursor.y.saturating_add(1);
        }
        if self.cursor.y > full_h {
            self.cursor.y = full_h;
            return PrintStatus::EndOfSurface;
        }
        PrintStatus::Printed
    }

    /// Print text with the current pen.
    ///
    /// Grapheme clusters become cells (combining marks share their base's
    /// cell); `\n` starts a new row, `\r` returns to column 1 and `\t`
    /// advances to the next multiple of 8. Zero-width clusters are skipped.
    pub fn print_str(&mut self, text: &str) -> PrintStatus {
        for grapheme in text.graphemes(true) {
            match grapheme {
                "\n" | "\r\n" => {
                    self.cursor.x = 1;
                    self.cursor.y = self.cursor.y.saturating_add(1);
                    if self.cursor.y > self.full_height() {
                        self.cursor.y = self.full_height().max(1);
                        return PrintStatus::EndOfSurface;
                    }
                    continue;
                }
                "\r" => {
                    self.cursor.x = 1;
                    continue;
                }
                "\t" => {
                    let col = self.cursor.x - 1;
                    let stop = (col / 8 + 1) * 8;
                    for _ in col..stop {
                        if self.print(self.pen) == PrintStatus::EndOfSurface {
                            return PrintStatus::EndOfSurface;
                        }
                        if self.cursor.x == 1 {
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }

            let mut ch = ['\0'; MAX_CODEPOINTS];
            for (slot, c) in ch.iter_mut().zip(grapheme.chars()) {
                *slot = c;
            }
            let cell = CellFormat { ch, ..self.pen }.measured();
            if cell.char_width() == 0 {
                continue;
            }
            if self.print(cell) == PrintStatus::EndOfSurface {
                return PrintStatus::EndOfSurface;
            }
        }
        PrintStatus::Printed
    }

    /// Fill the content area with `fill_char` in the pen's colors.
    ///
    /// Shadow cells become transparent so the shadow never hides what is
    /// beneath it. Every row is marked dirty and the cursor returns home.
    pub fn clear(&mut self, fill_char: char) {
        let mut fill = CellFormat {
            ch: [fill_char, '\0', '\0', '\0', '\0'],
            ..self.pen
        }
        .measured();
        if fill.char_width() != 1 {
            fill.ch = [' ', '\0', '\0', '\0', '\0'];
            fill = fill.measured();
        }
        let full_w = self.full_width();
        let width = self.size.width;
        let height = self.size.height;
        let content_trans = if fill.reads_beneath() { width } else { 0 };

        for (i, cell) in self.cells.iter_mut().enumerate() {
            let x = (i % full_w as usize) as u16;
            let y = (i / full_w as usize) as u16;
            *cell = if x >= width || y >= height {
                CellFormat::TRANSPARENT
            } else {
                fill
            };
        }
        for (y, line) in self.changes.iter_mut().enumerate() {
            line.trans_count = if y as u16 >= height {
                full_w
            } else {
                content_trans + self.shadow.width
            };
        }
        self.mark_all_dirty();
        self.cursor = Point::new(1, 1);
    }

    /// Fill a local rectangle (shadow included) with `cell`.
    pub fn fill(&mut self, rect: Rect, cell: CellFormat) {
        let bounds = Rect::from_size(self.full_width(), self.full_height());
        let clipped = bounds.intersection(&rect);
        let step = if cell.is_wide() { 2 } else { 1 };
        for y in clipped.y..clipped.bottom() {
            let mut x = clipped.x;
            while x < clipped.right() {
                self.put_cell(x, y, cell);
                x += step;
            }
        }
    }

    /// Paint a classic drop shadow into the shadow margin.
    ///
    /// The cells next to the top-right and bottom-left corners stay
    /// transparent; the rest of the margin tints whatever is beneath with
    /// `fg`/`bg`.
    pub fn draw_shadow(&mut self, fg: Color, bg: Color) {
        let tint = CellFormat::TRANSPARENT
            .with_composite(CompositeFlags::COLOR_OVERLAY)
            .with_fg(fg)
            .with_bg(bg);
        let (w, h) = (self.size.width, self.size.height);
        let (sw, sh) = (self.shadow.width, self.shadow.height);

        for y in 0..h {
            for x in w..w + sw {
                let cell = if y < sh.max(1) { CellFormat::TRANSPARENT } else { tint };
                self.write_cell(x, y, cell);
            }
        }
        for y in h..h + sh {
            for x in 0..w + sw {
                let cell = if x < sw.max(1) { CellFormat::TRANSPARENT } else { tint };
                self.write_cell(x, y, cell);
            }
        }
    }

    // ── Input cursor ───────────────────────────────────────────────────

    /// Ask for the hardware cursor at local content position `(x, y)`.
    pub fn set_input_cursor(&mut self, x: u16, y: u16) {
        self.input_cursor = Some(Point::new(x, y));
    }

    pub fn hide_input_cursor(&mut self) {
        self.input_cursor = None;
    }

    #[inline]
    pub const fn input_cursor(&self) -> Option<Point> {
        self.input_cursor
    }
}
