use serde_json::json;

use super::{AutomationHost, FormatCodes, HostDocument, HostKind, HostSession};
use crate::error::ConvertError;
use crate::job::DocumentContent;

pub struct PowerPointHost(HostSession);

impl PowerPointHost {
    /// `ppSaveAsOpenXMLPresentation`
    pub const FORMAT_OPENXML_PRESENTATION: i32 = 24;
    /// `ppSaveAsPDF`
    pub const FORMAT_PDF: i32 = 32;
    /// `ppLayoutText`: a title placeholder followed by a body placeholder.
    pub const LAYOUT_TEXT: i64 = 2;

    const TITLE_SHAPE: i64 = 1;
    const BODY_SHAPE: i64 = 2;

    /// Append one text slide per page, titled `Page N`. Returns the number
    /// of slides added.
    pub fn add_slides(
        deck: &mut HostDocument<'_>,
        content: &DocumentContent,
    ) -> Result<usize, ConvertError> {
        for (idx, page) in content.pages.iter().enumerate() {
            let slide = idx as i64 + 1;
            deck.invoke("AddSlide", vec![json!(slide), json!(Self::LAYOUT_TEXT)])?;
            deck.invoke(
                "SetShapeText",
                vec![
                    json!(slide),
                    json!(Self::TITLE_SHAPE),
                    json!(format!("Page {slide}")),
                ],
            )?;
            deck.invoke(
                "SetShapeText",
                vec![json!(slide), json!(Self::BODY_SHAPE), json!(page.trim())],
            )?;
        }
        Ok(content.pages.len())
    }
}

impl AutomationHost for PowerPointHost {
    const KIND: HostKind = HostKind::PowerPoint;
    const DEFAULT_CODES: FormatCodes = FormatCodes {
        native: Self::FORMAT_OPENXML_PRESENTATION,
        pdf: Self::FORMAT_PDF,
    };

    fn from_session(session: HostSession) -> Self {
        Self(session)
    }

    fn session(&mut self) -> &mut HostSession {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RemoteCall;
    use crate::testing::FakeLauncher;

    #[test]
    fn one_titled_slide_per_page() {
        let launcher = FakeLauncher::new();
        let mut deck_host =
            PowerPointHost::acquire(&launcher, PowerPointHost::DEFAULT_CODES).unwrap();
        let content = DocumentContent::new(vec!["First page".into(), "".into()]);
        {
            let mut deck = deck_host.create().unwrap();
            assert_eq!(PowerPointHost::add_slides(&mut deck, &content).unwrap(), 2);
        }

        let methods: Vec<String> = launcher
            .calls_with_op("invoke")
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Invoke { method, .. } => Some(method),
                _ => None,
            })
            .collect();
        assert_eq!(methods.iter().filter(|m| *m == "AddSlide").count(), 2);
        assert_eq!(methods.iter().filter(|m| *m == "SetShapeText").count(), 4);
    }
}
