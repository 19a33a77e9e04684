//! Paginated document layout.
//!
//! `DocumentComposer` owns the vertical write cursor for one document. Every
//! operation checks the space it needs against the current page, breaks to a
//! new page when the remainder is insufficient, draws, then advances the
//! cursor by the measured height. Drawing goes through the `Canvas` seam so
//! layout can be tested without producing a PDF.

use crate::chart::spec::Rgb;
use crate::chart::EncodedImage;
use crate::error::{ReportError, ReportResult};

pub mod pdf;
pub mod report;
pub mod text;

pub use pdf::PdfCanvas;
pub use report::{compose_report, render_pdf, report_file_name, ComposeOptions, ComposedDocument};

pub const BLACK: Rgb = (0, 0, 0);
pub const NOTE_GRAY: Rgb = (80, 80, 80);
pub const RULE_GRAY: Rgb = (200, 200, 200);
pub const HEADER_BLUE: Rgb = (52, 152, 219);

pub const BODY_PT: f64 = 10.0;
pub const BODY_LINE_MM: f64 = 5.0;
pub const NOTE_PT: f64 = 9.0;
pub const NOTE_LINE_MM: f64 = 4.0;
pub const SECTION_PT: f64 = 16.0;
pub const SUBSECTION_PT: f64 = 12.0;
pub const TABLE_ROW_MM: f64 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
}

impl PageGeometry {
    pub const A4: PageGeometry = PageGeometry {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_mm: 20.0,
    };

    pub fn content_width(&self) -> f64 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height(&self) -> f64 {
        self.height_mm - 2.0 * self.margin_mm
    }

    /// Lowest y the cursor may reach on a page.
    pub fn bottom_limit(&self) -> f64 {
        self.height_mm - self.margin_mm
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f64,
    pub bold: bool,
    pub color: Rgb,
}

impl TextStyle {
    pub const fn regular(size_pt: f64) -> Self {
        Self {
            size_pt,
            bold: false,
            color: BLACK,
        }
    }

    pub const fn bold(size_pt: f64) -> Self {
        Self {
            size_pt,
            bold: true,
            color: BLACK,
        }
    }

    pub const fn colored(self, color: Rgb) -> Self {
        Self { color, ..self }
    }
}

/// Drawing surface for composed pages. Coordinates are millimetres from the
/// top-left corner of the current page; text `y` is the baseline.
pub trait Canvas {
    /// Start a new page; the first page exists from construction.
    fn begin_page(&mut self);
    fn draw_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle);
    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb, thickness_pt: f64);
    fn draw_image(
        &mut self,
        image: &EncodedImage,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> ReportResult<()>;
}

/// A table laid out across the content width.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Column shares of the content width; must sum to 1.
    pub columns: Vec<f64>,
}

pub struct DocumentComposer<C: Canvas> {
    canvas: C,
    geometry: PageGeometry,
    cursor_y: f64,
    pages: usize,
}

impl<C: Canvas> DocumentComposer<C> {
    pub fn new(canvas: C, geometry: PageGeometry) -> Self {
        Self {
            canvas,
            cursor_y: geometry.margin_mm,
            geometry,
            pages: 1,
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor_y
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    pub fn new_page(&mut self) {
        self.canvas.begin_page();
        self.pages += 1;
        self.cursor_y = self.geometry.margin_mm;
    }

    /// Break to a new page if `required` mm no longer fit below the cursor.
    pub fn ensure_space(&mut self, required: f64) {
        if self.cursor_y + required > self.geometry.bottom_limit() {
            self.new_page();
        }
    }

    /// Text centred horizontally at an absolute baseline; the cursor is untouched.
    pub fn place_centered(&mut self, text: &str, y: f64, style: TextStyle) {
        let w = text::text_width_mm(text, style.size_pt, style.bold);
        let x = (self.geometry.width_mm - w) / 2.0;
        self.canvas.draw_text(text, x, y, style);
    }

    pub fn add_section_title(&mut self, title: &str) {
        self.ensure_space(30.0);
        self.canvas
            .draw_text(title, self.geometry.margin_mm, self.cursor_y, TextStyle::bold(SECTION_PT));
        self.cursor_y += 10.0;
    }

    pub fn add_subsection_title(&mut self, title: &str) {
        self.ensure_space(20.0);
        let style = TextStyle::bold(SUBSECTION_PT);
        self.canvas
            .draw_text(title, self.geometry.margin_mm, self.cursor_y, style);
        self.cursor_y += 7.0;
    }

    /// Wrapped body text. Each line is checked on its own, so a break falls
    /// between lines and never inside one.
    pub fn add_paragraph(&mut self, body: &str) {
        self.add_lines(body, TextStyle::regular(BODY_PT), BODY_LINE_MM);
    }

    /// Small gray explanatory text followed by a short gap.
    pub fn add_note(&mut self, note: &str) {
        self.add_lines(note, TextStyle::regular(NOTE_PT).colored(NOTE_GRAY), NOTE_LINE_MM);
        self.cursor_y += 5.0;
    }

    fn add_lines(&mut self, body: &str, style: TextStyle, line_mm: f64) {
        let lines = text::wrap_text(body, self.geometry.content_width(), style.size_pt, style.bold);
        for line in lines {
            self.ensure_space(line_mm);
            self.canvas
                .draw_text(&line, self.geometry.margin_mm, self.cursor_y, style);
            self.cursor_y += line_mm;
        }
    }

    pub fn add_space(&mut self, mm: f64) {
        self.cursor_y += mm;
    }

    /// Centred image followed by a caption line.
    pub fn add_image(
        &mut self,
        image: &EncodedImage,
        width: f64,
        height: f64,
        caption: &str,
    ) -> ReportResult<()> {
        let required = height + 15.0;
        if width > self.geometry.content_width() || required > self.geometry.content_height() {
            return Err(ReportError::Compose(format!(
                "image {:.0}x{:.0} mm does not fit the printable area {:.0}x{:.0} mm",
                width,
                height,
                self.geometry.content_width(),
                self.geometry.content_height()
            )));
        }
        self.ensure_space(required);
        let x = (self.geometry.width_mm - width) / 2.0;
        self.canvas.draw_image(image, x, self.cursor_y, width, height)?;
        if !caption.is_empty() {
            self.place_centered(
                caption,
                self.cursor_y + height + 4.0,
                TextStyle::regular(NOTE_PT).colored(NOTE_GRAY),
            );
        }
        self.cursor_y += height + 10.0;
        Ok(())
    }

    /// Draw `table` from the cursor, repeating the header after page breaks.
    /// The cursor resumes below the table's final row.
    pub fn add_table(&mut self, table: &Table) -> ReportResult<()> {
        if table.columns.len() != table.header.len() {
            return Err(ReportError::Compose(format!(
                "table has {} header cells but {} columns",
                table.header.len(),
                table.columns.len()
            )));
        }
        if let Some(row) = table.rows.iter().find(|r| r.len() != table.columns.len()) {
            return Err(ReportError::Compose(format!(
                "table row has {} cells, expected {}",
                row.len(),
                table.columns.len()
            )));
        }

        self.ensure_space(TABLE_ROW_MM * 2.0);
        let mut y = self.cursor_y;
        y = self.draw_table_header(table, y);
        for row in &table.rows {
            if y + TABLE_ROW_MM > self.geometry.bottom_limit() {
                self.new_page();
                y = self.draw_table_header(table, self.cursor_y);
            }
            self.draw_table_row(table, row, y, TextStyle::regular(BODY_PT));
            y += TABLE_ROW_MM;
            self.canvas.draw_line(
                (self.geometry.margin_mm, y),
                (self.geometry.width_mm - self.geometry.margin_mm, y),
                RULE_GRAY,
                0.5,
            );
        }
        let final_y = y;
        self.cursor_y = final_y + 10.0;
        self.ensure_space(20.0);
        Ok(())
    }

    fn draw_table_header(&mut self, table: &Table, y: f64) -> f64 {
        let left = self.geometry.margin_mm;
        let right = self.geometry.width_mm - self.geometry.margin_mm;
        let style = TextStyle::bold(BODY_PT).colored(HEADER_BLUE);
        self.draw_table_row(table, &table.header, y, style);
        let y = y + TABLE_ROW_MM;
        self.canvas.draw_line((left, y), (right, y), HEADER_BLUE, 1.0);
        y
    }

    fn draw_table_row(&mut self, table: &Table, cells: &[String], y: f64, style: TextStyle) {
        let mut x = self.geometry.margin_mm;
        for (cell, share) in cells.iter().zip(&table.columns) {
            let width = share * self.geometry.content_width();
            let text = fit_to_width(cell, width - 4.0, style);
            self.canvas.draw_text(&text, x + 2.0, y + 5.0, style);
            x += width;
        }
    }
}

fn fit_to_width(cell: &str, max_mm: f64, style: TextStyle) -> String {
    if text::text_width_mm(cell, style.size_pt, style.bold) <= max_mm {
        return cell.to_string();
    }
    let mut out: String = cell.to_string();
    while !out.is_empty() {
        out.pop();
        let candidate = format!("{}...", out);
        if text::text_width_mm(&candidate, style.size_pt, style.bold) <= max_mm {
            return candidate;
        }
    }
    String::new()
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text { page: usize, text: String, x: f64, y: f64, style: TextStyle },
    Line { page: usize, from: (f64, f64), to: (f64, f64) },
    Image { page: usize, x: f64, y: f64, width: f64, height: f64 },
}

impl DrawOp {
    pub fn page(&self) -> usize {
        match self {
            DrawOp::Text { page, .. }
            | DrawOp::Line { page, .. }
            | DrawOp::Image { page, .. } => *page,
        }
    }
}

/// Canvas that records operations instead of drawing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    pub ops: Vec<DrawOp>,
    page: usize,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-based index of the current page.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn texts(&self) -> impl Iterator<Item = (usize, &str)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { page, text, .. } => Some((*page, text.as_str())),
            _ => None,
        })
    }

    /// Page on which `needle` first appears as a drawn text run.
    pub fn page_of(&self, needle: &str) -> Option<usize> {
        self.texts().find(|(_, t)| *t == needle).map(|(p, _)| p)
    }
}

impl Canvas for RecordingCanvas {
    fn begin_page(&mut self) {
        self.page += 1;
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) {
        self.ops.push(DrawOp::Text {
            page: self.page,
            text: text.to_string(),
            x,
            y,
            style,
        });
    }

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), _color: Rgb, _thickness_pt: f64) {
        self.ops.push(DrawOp::Line {
            page: self.page,
            from,
            to,
        });
    }

    fn draw_image(
        &mut self,
        _image: &EncodedImage,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> ReportResult<()> {
        self.ops.push(DrawOp::Image {
            page: self.page,
            x,
            y,
            width,
            height,
        });
        Ok(())
    }
}
