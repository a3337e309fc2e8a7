use super::{AutomationHost, FormatCodes, HostKind, HostSession};

/// Word. Opening a PDF makes Word reflow it into an editable document, so a
/// PDF to Word conversion is an open followed by a save.
pub struct WordHost(HostSession);

impl WordHost {
    /// `wdFormatDocumentDefault`
    pub const FORMAT_DOCUMENT_DEFAULT: i32 = 16;
    /// `wdFormatPDF`
    pub const FORMAT_PDF: i32 = 17;
}

impl AutomationHost for WordHost {
    const KIND: HostKind = HostKind::Word;
    const DEFAULT_CODES: FormatCodes = FormatCodes {
        native: Self::FORMAT_DOCUMENT_DEFAULT,
        pdf: Self::FORMAT_PDF,
    };

    fn from_session(session: HostSession) -> Self {
        Self(session)
    }

    fn session(&mut self) -> &mut HostSession {
        &mut self.0
    }
}
