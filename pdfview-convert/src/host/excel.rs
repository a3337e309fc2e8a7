use serde_json::json;

use super::{AutomationHost, FormatCodes, HostDocument, HostKind, HostSession};
use crate::error::ConvertError;
use crate::job::DocumentContent;

pub struct ExcelHost(HostSession);

impl ExcelHost {
    /// `xlOpenXMLWorkbook`
    pub const FORMAT_OPENXML_WORKBOOK: i32 = 51;
    /// `xlTypePDF` as accepted by the bridge's save
    pub const FORMAT_PDF: i32 = 57;

    const SHEET: i64 = 1;
    const COLUMN: i64 = 1;

    /// Write every non-empty line of every page down the first column of
    /// the first worksheet, one empty row between pages. Returns the number
    /// of cells written.
    pub fn write_pages(
        book: &mut HostDocument<'_>,
        content: &DocumentContent,
    ) -> Result<usize, ConvertError> {
        let mut row: i64 = 1;
        let mut written = 0;
        for page in &content.pages {
            let mut lines = page.lines().map(str::trim).filter(|line| !line.is_empty()).peekable();
            if lines.peek().is_none() {
                continue;
            }
            if written > 0 {
                row += 1;
            }
            for line in lines {
                book.invoke(
                    "SetCell",
                    vec![json!(Self::SHEET), json!(row), json!(Self::COLUMN), json!(line)],
                )?;
                row += 1;
                written += 1;
            }
        }
        Ok(written)
    }
}

impl AutomationHost for ExcelHost {
    const KIND: HostKind = HostKind::Excel;
    const DEFAULT_CODES: FormatCodes = FormatCodes {
        native: Self::FORMAT_OPENXML_WORKBOOK,
        pdf: Self::FORMAT_PDF,
    };

    fn from_session(session: HostSession) -> Self {
        Self(session)
    }

    fn session(&mut self) -> &mut HostSession {
        &mut self.0
    }
}
