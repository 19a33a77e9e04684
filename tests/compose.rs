use process_report::compose::text::text_width_mm;
use process_report::compose::{
    DocumentComposer, DrawOp, PageGeometry, RecordingCanvas, BODY_LINE_MM, BODY_PT,
};

fn body_lines(canvas: &RecordingCanvas) -> Vec<(usize, f64, String)> {
    canvas
        .ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text { page, y, text, style, .. } if style.size_pt == BODY_PT && !style.bold => {
                Some((*page, *y, text.clone()))
            }
            _ => None,
        })
        .collect()
}

#[test]
fn long_paragraph_breaks_exactly_when_a_line_no_longer_fits() {
    let geometry = PageGeometry::A4;
    let sentence = "Raising the hot fluid flow improved heat recovery in every top scenario. ";
    let text = sentence.repeat(120);

    let mut doc = DocumentComposer::new(RecordingCanvas::new(), geometry);
    doc.add_paragraph(&text);
    assert!(doc.pages() >= 2);
    let canvas = doc.into_canvas();
    let lines = body_lines(&canvas);

    for pair in lines.windows(2) {
        let (page_a, y_a, _) = &pair[0];
        let (page_b, y_b, _) = &pair[1];
        if page_a == page_b {
            assert_eq!(*y_b, y_a + BODY_LINE_MM);
        } else {
            // The next line would have crossed the bottom margin.
            assert!(y_a + BODY_LINE_MM + BODY_LINE_MM > geometry.bottom_limit());
            assert_eq!(*y_b, geometry.margin_mm);
        }
    }
    for (_, y, line) in &lines {
        assert!(y + BODY_LINE_MM <= geometry.bottom_limit() + 1e-9);
        assert!(text_width_mm(line, BODY_PT, false) <= geometry.content_width());
    }
}

#[test]
fn content_that_fits_stays_on_one_page() {
    let mut doc = DocumentComposer::new(RecordingCanvas::new(), PageGeometry::A4);
    doc.add_section_title("Executive Summary");
    doc.add_paragraph("Short body.");
    doc.add_space(10.0);
    doc.add_subsection_title("Insights");
    doc.add_paragraph("Another short body.");
    assert_eq!(doc.pages(), 1);
    assert_eq!(doc.cursor(), 20.0 + 10.0 + 5.0 + 10.0 + 7.0 + 5.0);
}
