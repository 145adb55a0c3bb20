//! Report documents for extracted records.
//!
//! The [`ReportEmitter`] trait is the seam the pipeline renders through;
//! [`PdfReport`] is the production implementation. Geometry is computed by
//! [`TableLayout`] first and only then drawn with `printpdf`.

mod layout;

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rect, Rgb,
};
use sheetdrop_shared::{FieldValue, Result, SheetdropError};
use tracing::{debug, info, instrument, warn};

pub use layout::{BlockLayout, CellBox, PageLayout, TableLayout};
use layout::{CELL_FONT_PT, PAGE_HEIGHT_MM, PAGE_WIDTH_MM, TITLE_FONT_PT};

/// Default number of columns per table block.
pub const DEFAULT_MAX_COLUMNS: usize = 4;

/// Renders one record to a document at `dest`.
///
/// Implementations must leave either a complete document or nothing at
/// `dest`; the caller commits the file as processed only after `Ok`.
pub trait ReportEmitter {
    fn render(&self, title: &str, rows: &[(String, FieldValue)], dest: &Path) -> Result<()>;
}

/// PDF summary table on US-letter pages.
#[derive(Debug, Clone)]
pub struct PdfReport {
    max_columns: usize,
}

impl PdfReport {
    pub fn new(max_columns: usize) -> Self {
        Self {
            max_columns: max_columns.max(1),
        }
    }
}

impl Default for PdfReport {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COLUMNS)
    }
}

impl ReportEmitter for PdfReport {
    #[instrument(skip_all, fields(dest = %dest.display(), fields = rows.len()))]
    fn render(&self, title: &str, rows: &[(String, FieldValue)], dest: &Path) -> Result<()> {
        let headers: Vec<String> = rows.iter().map(|(name, _)| name.clone()).collect();
        let values: Vec<String> = rows.iter().map(|(_, value)| value.to_string()).collect();
        let layout = TableLayout::compute(&headers, &values, self.max_columns);
        debug!(
            pages = layout.pages.len(),
            blocks = layout.block_count(),
            "report laid out"
        );

        let doc = draw(title, &layout)?;

        if let Some(dir) = dest.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                SheetdropError::Render(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let temp = temp_path(dest);
        if let Err(e) = save(doc, &temp, dest) {
            if let Err(cleanup) = std::fs::remove_file(&temp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(temp = %temp.display(), error = %cleanup, "failed to remove partial report");
                }
            }
            return Err(e);
        }

        info!(pages = layout.pages.len(), "report written");
        Ok(())
    }
}

/// `<dest>.tmp`, next to the final file.
fn temp_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn save(doc: PdfDocumentReference, temp: &Path, dest: &Path) -> Result<()> {
    let file = File::create(temp)
        .map_err(|e| SheetdropError::Render(format!("cannot create {}: {e}", temp.display())))?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer)
        .map_err(|e| SheetdropError::Render(format!("cannot write PDF: {e}")))?;

    let file = writer
        .into_inner()
        .map_err(|e| SheetdropError::Render(format!("cannot flush {}: {e}", temp.display())))?;
    file.sync_all()
        .map_err(|e| SheetdropError::Render(format!("cannot sync {}: {e}", temp.display())))?;

    std::fs::rename(temp, dest).map_err(|e| {
        SheetdropError::Render(format!("cannot move report into {}: {e}", dest.display()))
    })
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw(title: &str, layout: &TableLayout) -> Result<PdfDocumentReference> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    let font = |builtin: BuiltinFont| {
        doc.add_builtin_font(builtin)
            .map_err(|e| SheetdropError::Render(format!("cannot load font: {e}")))
    };
    let fonts = Fonts {
        regular: font(BuiltinFont::Helvetica)?,
        bold: font(BuiltinFont::HelveticaBold)?,
    };

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_idx, layer_idx) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page_idx).get_layer(layer_idx)
        };

        if let Some(y) = page.title_y {
            layer.set_fill_color(black());
            layer.use_text(title, TITLE_FONT_PT, Mm(20.0), Mm(y), &fonts.bold);
        }
        for cell in page.blocks.iter().flat_map(|b| &b.cells) {
            draw_cell(&layer, cell, &fonts);
        }
    }

    Ok(doc)
}

fn draw_cell(layer: &PdfLayerReference, cell: &CellBox, fonts: &Fonts) {
    let rect = Rect::new(
        Mm(cell.x),
        Mm(cell.y),
        Mm(cell.x + cell.width),
        Mm(cell.y + cell.height),
    );

    layer.set_outline_color(grey());
    layer.set_outline_thickness(0.5);
    if cell.header {
        layer.set_fill_color(grey());
        layer.add_rect(rect.with_mode(PaintMode::FillStroke));
    } else {
        layer.add_rect(rect.with_mode(PaintMode::Stroke));
    }

    let font = if cell.header { &fonts.bold } else { &fonts.regular };
    layer.set_fill_color(black());
    layer.use_text(
        cell.text.as_str(),
        CELL_FONT_PT,
        Mm(cell.text_x()),
        Mm(cell.text_y()),
        font,
    );
}

fn grey() -> Color {
    Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None))
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}
