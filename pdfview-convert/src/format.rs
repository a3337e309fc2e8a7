use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::host::HostKind;
use crate::job::ConversionJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Word,
    Excel,
    PowerPoint,
    Unknown,
}

impl Format {
    /// Extension written for this format when the user does not choose one.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Format::Pdf => Some("pdf"),
            Format::Word => Some("docx"),
            Format::Excel => Some("xlsx"),
            Format::PowerPoint => Some("pptx"),
            Format::Unknown => None,
        }
    }

    /// The office application that natively handles this format.
    pub fn host_kind(self) -> Option<HostKind> {
        match self {
            Format::Word => Some(HostKind::Word),
            Format::Excel => Some(HostKind::Excel),
            Format::PowerPoint => Some(HostKind::PowerPoint),
            Format::Pdf | Format::Unknown => None,
        }
    }

    pub fn is_office(self) -> bool {
        self.host_kind().is_some()
    }

    /// Parse an export target name as typed by a user (`word`, `docx`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Format::Pdf),
            "word" | "doc" | "docx" => Some(Format::Word),
            "excel" | "xls" | "xlsx" => Some(Format::Excel),
            "powerpoint" | "ppt" | "pptx" => Some(Format::PowerPoint),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Pdf => "PDF",
            Format::Word => "Word",
            Format::Excel => "Excel",
            Format::PowerPoint => "PowerPoint",
            Format::Unknown => "unknown format",
        };
        f.write_str(name)
    }
}

/// Format of `path` judged by its extension, ignoring case.
pub fn detect_format(path: &Path) -> Format {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return Format::Unknown;
    };
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Format::Pdf,
        "doc" | "docx" => Format::Word,
        "xls" | "xlsx" => Format::Excel,
        "ppt" | "pptx" => Format::PowerPoint,
        _ => Format::Unknown,
    }
}

/// `source` with its extension replaced by the one of `target`.
pub fn default_output_path(source: &Path, target: Format) -> PathBuf {
    match target.extension() {
        Some(ext) => source.with_extension(ext),
        None => source.to_path_buf(),
    }
}

/// What opening a file for viewing requires.
#[derive(Debug)]
pub enum OpenRoute {
    /// Hand the path straight to the PDF provider.
    Direct(PathBuf),
    /// Convert to PDF first, then open the job's target.
    Convert(ConversionJob),
}

pub fn route_open(path: &Path, output: Option<PathBuf>) -> OpenRoute {
    let format = detect_format(path);
    if !format.is_office() {
        return OpenRoute::Direct(path.to_path_buf());
    }
    let target = output.unwrap_or_else(|| default_output_path(path, Format::Pdf));
    OpenRoute::Convert(ConversionJob::new(path, target, Format::Pdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_format_ignores_case() {
        assert_eq!(detect_format(Path::new("a/report.PDF")), Format::Pdf);
        assert_eq!(detect_format(Path::new("letter.Docx")), Format::Word);
        assert_eq!(detect_format(Path::new("letter.doc")), Format::Word);
        assert_eq!(detect_format(Path::new("sheet.XLS")), Format::Excel);
        assert_eq!(detect_format(Path::new("deck.pptx")), Format::PowerPoint);
        assert_eq!(detect_format(Path::new("deck.ppt")), Format::PowerPoint);
    }

    #[test]
    fn unrecognized_extension_is_unknown() {
        assert_eq!(detect_format(Path::new("notes.txt")), Format::Unknown);
        assert_eq!(detect_format(Path::new("Makefile")), Format::Unknown);
        assert_eq!(detect_format(Path::new("archive.tar.gz")), Format::Unknown);
    }

    #[test]
    fn office_files_route_through_conversion() {
        match route_open(Path::new("/docs/report.pptx"), None) {
            OpenRoute::Convert(job) => {
                assert_eq!(job.source_format, Format::PowerPoint);
                assert_eq!(job.target_format, Format::Pdf);
                assert_eq!(job.target, PathBuf::from("/docs/report.pdf"));
            }
            other => panic!("unexpected route: {:?}", other),
        }
    }

    #[test]
    fn chosen_output_path_wins() {
        match route_open(Path::new("/docs/sheet.xlsx"), Some("/tmp/out.pdf".into())) {
            OpenRoute::Convert(job) => assert_eq!(job.target, PathBuf::from("/tmp/out.pdf")),
            other => panic!("unexpected route: {:?}", other),
        }
    }

    #[test]
    fn pdf_and_unknown_open_directly() {
        assert!(matches!(
            route_open(Path::new("a.pdf"), None),
            OpenRoute::Direct(_)
        ));
        assert!(matches!(
            route_open(Path::new("a.bin"), None),
            OpenRoute::Direct(_)
        ));
    }

    #[test]
    fn export_names_parse() {
        assert_eq!(Format::from_name("Word"), Some(Format::Word));
        assert_eq!(Format::from_name("pptx"), Some(Format::PowerPoint));
        assert_eq!(Format::from_name("odt"), None);
    }
}
