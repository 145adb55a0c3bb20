//! Page geometry for the summary table, independent of PDF drawing.
//!
//! All measurements are millimetres with the origin at the bottom-left of
//! the page, as in PDF user space.

/// US letter width.
pub const PAGE_WIDTH_MM: f32 = 215.9;
/// US letter height.
pub const PAGE_HEIGHT_MM: f32 = 279.4;

const MARGIN_MM: f32 = 20.0;
const TITLE_BAND_MM: f32 = 16.0;
const ROW_HEIGHT_MM: f32 = 9.0;
const BLOCK_GAP_MM: f32 = 8.0;

pub const TITLE_FONT_PT: f32 = 18.0;
pub const CELL_FONT_PT: f32 = 11.0;

const PT_TO_MM: f32 = 0.352_778;
/// Average Helvetica glyph advance, as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.55;
const CELL_PADDING_MM: f32 = 2.0;

/// One table cell: its box and the text centered in it.
#[derive(Debug, Clone, PartialEq)]
pub struct CellBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    /// Header cells are bold on a grey band.
    pub header: bool,
}

impl CellBox {
    /// Left edge of the text, given its estimated width.
    pub fn text_x(&self) -> f32 {
        let text_width = estimate_width_mm(&self.text, CELL_FONT_PT);
        self.x + ((self.width - text_width) / 2.0).max(CELL_PADDING_MM)
    }

    /// Baseline of the text.
    pub fn text_y(&self) -> f32 {
        self.y + (self.height - CELL_FONT_PT * PT_TO_MM) / 2.0 + 0.5
    }
}

/// A header row plus a value row covering one slice of the fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    /// Index of the first field in this block.
    pub first_field: usize,
    pub cells: Vec<CellBox>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    /// Title baseline, on the first page only.
    pub title_y: Option<f32>,
    pub blocks: Vec<BlockLayout>,
}

/// The laid-out report: one or more pages of column blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub pages: Vec<PageLayout>,
}

impl TableLayout {
    /// Lay out `headers` over `values`, at most `max_columns` per block.
    ///
    /// A block that would cross the bottom margin starts a new page. The
    /// result always has at least one page.
    pub fn compute(headers: &[String], values: &[String], max_columns: usize) -> Self {
        let max_columns = max_columns.max(1);
        let column_width = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / max_columns as f32;
        let block_height = 2.0 * ROW_HEIGHT_MM;
        let top = PAGE_HEIGHT_MM - MARGIN_MM;

        let mut pages = vec![PageLayout {
            title_y: Some(top - TITLE_FONT_PT * PT_TO_MM),
            blocks: Vec::new(),
        }];
        let mut cursor = top - TITLE_BAND_MM;

        for (chunk_index, chunk) in headers.chunks(max_columns).enumerate() {
            if cursor - block_height < MARGIN_MM {
                pages.push(PageLayout::default());
                cursor = top;
            }

            let first_field = chunk_index * max_columns;
            let header_y = cursor - ROW_HEIGHT_MM;
            let value_y = header_y - ROW_HEIGHT_MM;
            let mut cells = Vec::with_capacity(chunk.len() * 2);

            for (offset, name) in chunk.iter().enumerate() {
                let x = MARGIN_MM + offset as f32 * column_width;
                let value = values.get(first_field + offset).map(String::as_str).unwrap_or("");
                cells.push(CellBox {
                    x,
                    y: header_y,
                    width: column_width,
                    height: ROW_HEIGHT_MM,
                    text: fit_text(name, column_width),
                    header: true,
                });
                cells.push(CellBox {
                    x,
                    y: value_y,
                    width: column_width,
                    height: ROW_HEIGHT_MM,
                    text: fit_text(value, column_width),
                    header: false,
                });
            }

            if let Some(page) = pages.last_mut() {
                page.blocks.push(BlockLayout { first_field, cells });
            }
            cursor = value_y - BLOCK_GAP_MM;
        }

        Self { pages }
    }

    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }
}

fn estimate_width_mm(text: &str, font_pt: f32) -> f32 {
    text.chars().count() as f32 * font_pt * AVG_GLYPH_EM * PT_TO_MM
}

/// Shorten `text` with a trailing `...` until it fits a column.
fn fit_text(text: &str, column_width: f32) -> String {
    let available = column_width - 2.0 * CELL_PADDING_MM;
    if estimate_width_mm(text, CELL_FONT_PT) <= available {
        return text.to_string();
    }
    let glyph = CELL_FONT_PT * AVG_GLYPH_EM * PT_TO_MM;
    let keep = ((available / glyph) as usize).saturating_sub(3);
    let mut short: String = text.chars().take(keep).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(n: usize) -> (Vec<String>, Vec<String>) {
        let headers = (0..n).map(|i| format!("Field {i}")).collect();
        let values = (0..n).map(|i| i.to_string()).collect();
        (headers, values)
    }

    #[test]
    fn two_fields_fit_one_block() {
        let (h, v) = fields(2);
        let layout = TableLayout::compute(&h, &v, 4);

        assert_eq!(layout.pages.len(), 1);
        assert!(layout.pages[0].title_y.is_some());
        let block = &layout.pages[0].blocks[0];
        assert_eq!(block.cells.len(), 4);
        assert!(block.cells[0].header);
        assert_eq!(block.cells[0].text, "Field 0");
        assert!(!block.cells[1].header);
        assert_eq!(block.cells[1].text, "0");
        // Value row sits directly under the header row.
        assert!((block.cells[1].y + block.cells[1].height - block.cells[0].y).abs() < 1e-3);
    }

    #[test]
    fn wide_tables_split_into_column_blocks() {
        let (h, v) = fields(10);
        let layout = TableLayout::compute(&h, &v, 4);

        assert_eq!(layout.block_count(), 3);
        let blocks = &layout.pages[0].blocks;
        assert_eq!(blocks[0].first_field, 0);
        assert_eq!(blocks[1].first_field, 4);
        assert_eq!(blocks[2].first_field, 8);
        assert_eq!(blocks[2].cells.len(), 4);
        assert_eq!(blocks[2].cells[2].text, "Field 9");
        // Later blocks are lower on the page.
        assert!(blocks[1].cells[0].y < blocks[0].cells[1].y);
    }

    #[test]
    fn blocks_overflow_onto_new_pages() {
        let (h, v) = fields(60);
        let layout = TableLayout::compute(&h, &v, 4);

        assert!(layout.pages.len() > 1);
        assert_eq!(layout.block_count(), 15);
        assert!(layout.pages[1].title_y.is_none());
        for page in &layout.pages {
            assert!(!page.blocks.is_empty());
            for cell in page.blocks.iter().flat_map(|b| &b.cells) {
                assert!(cell.y >= MARGIN_MM);
                assert!(cell.y + cell.height <= PAGE_HEIGHT_MM - MARGIN_MM + 1e-3);
            }
        }
    }

    #[test]
    fn empty_input_still_has_a_page() {
        let layout = TableLayout::compute(&[], &[], 4);
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.block_count(), 0);
    }

    #[test]
    fn long_text_is_shortened() {
        let long = "A".repeat(200);
        let fitted = fit_text(&long, 40.0);
        assert!(fitted.ends_with("..."));
        assert!(fitted.len() < long.len());
        assert_eq!(fit_text("short", 40.0), "short");
    }
}
