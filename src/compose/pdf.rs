use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};

use crate::chart::spec::Rgb;
use crate::chart::EncodedImage;
use crate::compose::{Canvas, PageGeometry, TextStyle};
use crate::error::{ReportError, ReportResult};

const LAYER: &str = "Layer 1";
/// Raster density used to size embedded charts before scaling.
const IMAGE_DPI: f64 = 300.0;

fn color((r, g, b): Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

/// `Canvas` backed by an in-memory printpdf document.
pub struct PdfCanvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    geometry: PageGeometry,
    pages: usize,
}

impl PdfCanvas {
    pub fn new(title: &str, geometry: PageGeometry) -> ReportResult<Self> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(geometry.width_mm as f32),
            Mm(geometry.height_mm as f32),
            LAYER,
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Compose(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Compose(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            geometry,
            pages: 1,
        })
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Serialize the finished document.
    pub fn into_bytes(self) -> ReportResult<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| ReportError::Compose(format!("pdf serialization failed: {}", e)))
    }

    fn flip(&self, y: f64) -> Mm {
        Mm((self.geometry.height_mm - y) as f32)
    }
}

impl Canvas for PdfCanvas {
    fn begin_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(self.geometry.width_mm as f32),
            Mm(self.geometry.height_mm as f32),
            LAYER,
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.pages += 1;
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) {
        let font = if style.bold { &self.bold } else { &self.regular };
        self.layer.set_fill_color(color(style.color));
        self.layer
            .use_text(text, style.size_pt as f32, Mm(x as f32), self.flip(y), font);
    }

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), rgb: Rgb, thickness_pt: f64) {
        let line = Line {
            points: vec![
                (Point::new(Mm(from.0 as f32), self.flip(from.1)), false),
                (Point::new(Mm(to.0 as f32), self.flip(to.1)), false),
            ],
            is_closed: false,
        };
        self.layer.set_outline_color(color(rgb));
        self.layer.set_outline_thickness(thickness_pt as f32);
        self.layer.add_line(line);
    }

    fn draw_image(
        &mut self,
        chart: &EncodedImage,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> ReportResult<()> {
        let decoded = image::load_from_memory_with_format(&chart.png, image::ImageFormat::Png)
            .map_err(|e| ReportError::Compose(format!("embedded chart is not a PNG: {}", e)))?;
        let natural_w = decoded.width() as f64 * 25.4 / IMAGE_DPI;
        let natural_h = decoded.height() as f64 * 25.4 / IMAGE_DPI;
        if natural_w <= 0.0 || natural_h <= 0.0 {
            return Err(ReportError::Compose("embedded chart has no pixels".to_string()));
        }
        Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x as f32)),
                translate_y: Some(self.flip(y + height)),
                scale_x: Some((width / natural_w) as f32),
                scale_y: Some((height / natural_h) as f32),
                dpi: Some(IMAGE_DPI as f32),
                ..Default::default()
            },
        );
        Ok(())
    }
}
