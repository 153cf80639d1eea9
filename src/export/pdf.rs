use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use crate::error::{AppError, Result};

use super::ExportTable;

// A4 landscape
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 12.0;

const TITLE_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 8.0;
const ROW_HEIGHT: f32 = 5.5;
/// Rough average Helvetica glyph width at BODY_SIZE.
const CHAR_WIDTH: f32 = 1.6;
const MIN_COLUMN_CHARS: usize = 6;
const MAX_COLUMN_CHARS: usize = 40;

fn pdf_err(e: impl std::fmt::Display) -> AppError {
    AppError::Export(format!("Failed to build PDF: {}", e))
}

/// The builtin fonts only cover Latin-1.
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if (c as u32) < 0x20 => ' ',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

fn fit_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut cut: String = text.chars().take(max_chars - 3).collect();
    cut.push_str("...");
    cut
}

/// Column widths in characters, proportional to content and scaled to fit
/// the printable width.
fn column_chars(table: &ExportTable) -> Vec<usize> {
    let wanted: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let widest = table
                .rows
                .iter()
                .map(|row| row.get(i).map(|v| v.display().chars().count()).unwrap_or(0))
                .max()
                .unwrap_or(0)
                .max(column.label.chars().count());
            widest.clamp(MIN_COLUMN_CHARS, MAX_COLUMN_CHARS)
        })
        .collect();

    let available = ((PAGE_WIDTH - 2.0 * MARGIN) / CHAR_WIDTH) as usize;
    let total: usize = wanted.iter().sum::<usize>() + wanted.len();
    if total <= available {
        return wanted;
    }
    wanted
        .iter()
        .map(|w| ((w * available) / total).max(3))
        .collect()
}

struct Writer {
    font: IndirectFontRef,
    bold: IndirectFontRef,
    widths: Vec<usize>,
}

impl Writer {
    fn row(&self, layer: &PdfLayerReference, cells: &[String], y: f32, header: bool) {
        let font = if header { &self.bold } else { &self.font };
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(&self.widths) {
            let text = fit_text(&latin1(cell), *width);
            if !text.is_empty() {
                layer.use_text(text, BODY_SIZE, Mm(x), Mm(y), font);
            }
            x += (*width as f32 + 1.0) * CHAR_WIDTH;
        }
    }
}

pub(super) fn write_pdf(table: &ExportTable) -> Result<Vec<u8>> {
    let title = latin1(&table.title);
    let (doc, first_page, first_layer) =
        PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let writer = Writer {
        font: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        widths: column_chars(table),
    };
    let header: Vec<String> = table.columns.iter().map(|c| c.label.clone()).collect();

    let top = PAGE_HEIGHT - MARGIN;
    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    layer.use_text(
        format!("{} ({} records)", title, table.rows.len()),
        TITLE_SIZE,
        Mm(MARGIN),
        Mm(top),
        &writer.bold,
    );
    let mut y = top - 10.0;
    writer.row(&layer, &header, y, true);
    y -= ROW_HEIGHT;

    for row in &table.rows {
        if y < MARGIN {
            let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = top;
            writer.row(&layer, &header, y, true);
            y -= ROW_HEIGHT;
        }
        let cells: Vec<String> = row.iter().map(|v| v.display()).collect();
        writer.row(&layer, &cells, y, false);
        y -= ROW_HEIGHT;
    }

    doc.save_to_bytes().map_err(pdf_err)
}
