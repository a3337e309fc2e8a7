use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use pdfview_convert::{
    default_output_path, route_open, ConversionJob, ConversionQueue, Converter, DocumentContent,
    Format, JobId, Notification, OpenRoute,
};
use pdfview_core::error::NavResult;
use pdfview_core::{DocumentProvider, EventLog, Viewer, ViewerConfig, ViewerEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

const HELP: &str = "\
open <file> [out.pdf]        open a PDF, or convert a PowerPoint file and open the result
close                        close the document
page <n> | next | prev       go to a page
back | forward               walk the jump history
zoom in|out|<factor>         change the zoom
bookmarks | bookmark <n>     list or follow bookmarks
find <text> | n | N | hit <n>  search and step through matches
export word|excel|powerpoint [out]  convert the open PDF
cancel                       cancel the running conversion
info | help | quit";

/// One line of shell input. Numbers typed by the user start at 1.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Open { path: PathBuf, output: Option<PathBuf> },
    Close,
    Page(usize),
    Next,
    Prev,
    Back,
    Forward,
    ZoomIn,
    ZoomOut,
    Zoom(f32),
    Bookmarks,
    Bookmark(usize),
    Find(String),
    FindNext,
    FindPrevious,
    Hit(usize),
    Export { format: Format, output: Option<PathBuf> },
    Cancel,
    Info,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse a line. Blank lines are `Ok(None)`; the error is a message for
    /// the user.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if let Some(query) = line.strip_prefix('/') {
            return Ok(Some(ShellCommand::Find(query.trim().to_owned())));
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word {
            "open" | "o" => {
                let mut parts = rest.split_whitespace();
                let path = parts
                    .next()
                    .ok_or_else(|| "usage: open <file> [out.pdf]".to_owned())?;
                ShellCommand::Open {
                    path: PathBuf::from(path),
                    output: parts.next().map(PathBuf::from),
                }
            }
            "close" => ShellCommand::Close,
            "page" | "p" => ShellCommand::Page(parse_ordinal(rest)?),
            "next" | "j" => ShellCommand::Next,
            "prev" | "k" => ShellCommand::Prev,
            "back" => ShellCommand::Back,
            "forward" => ShellCommand::Forward,
            "zoom" => match rest {
                "in" | "+" => ShellCommand::ZoomIn,
                "out" | "-" => ShellCommand::ZoomOut,
                value => ShellCommand::Zoom(
                    value
                        .parse()
                        .map_err(|_| format!("expected in, out or a factor, got '{value}'"))?,
                ),
            },
            "bookmarks" | "toc" => ShellCommand::Bookmarks,
            "bookmark" => ShellCommand::Bookmark(parse_ordinal(rest)?),
            "find" => ShellCommand::Find(rest.to_owned()),
            "n" => ShellCommand::FindNext,
            "N" => ShellCommand::FindPrevious,
            "hit" => ShellCommand::Hit(parse_ordinal(rest)?),
            "export" => {
                let mut parts = rest.split_whitespace();
                let format = parts
                    .next()
                    .and_then(Format::from_name)
                    .filter(|format| format.is_office())
                    .ok_or_else(|| "usage: export word|excel|powerpoint [out]".to_owned())?;
                ShellCommand::Export {
                    format,
                    output: parts.next().map(PathBuf::from),
                }
            }
            "cancel" => ShellCommand::Cancel,
            "info" => ShellCommand::Info,
            "help" | "?" => ShellCommand::Help,
            "quit" | "q" | "exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(command))
    }
}

fn parse_ordinal(text: &str) -> Result<usize, String> {
    let value: usize = text
        .parse()
        .map_err(|_| format!("expected a number, got '{text}'"))?;
    value
        .checked_sub(1)
        .ok_or_else(|| "numbers start at 1".to_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented front end driving a [`Viewer`] and a [`ConversionQueue`].
pub struct Shell<W> {
    viewer: Viewer,
    events: EventLog,
    provider: Arc<dyn DocumentProvider>,
    queue: ConversionQueue,
    pending_open: Option<JobId>,
    out: W,
}

impl<W: Write> Shell<W> {
    pub fn new(
        config: ViewerConfig,
        provider: Arc<dyn DocumentProvider>,
        queue: ConversionQueue,
        out: W,
    ) -> Self {
        let mut viewer = Viewer::new(config);
        let events = EventLog::new();
        viewer.subscribe(Arc::new(events.clone()));
        Self {
            viewer,
            events,
            provider,
            queue,
            pending_open: None,
            out,
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Read commands and conversion outcomes until `quit` or end of input.
    pub async fn run(
        &mut self,
        mut lines: UnboundedReceiver<String>,
        mut notifications: UnboundedReceiver<Notification>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                line = lines.recv() => {
                    let Some(line) = line else { break };
                    match ShellCommand::parse(&line) {
                        Ok(Some(command)) => {
                            if self.execute(command).await? == Flow::Quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(message) => writeln!(self.out, "{message}")?,
                    }
                }
                Some(notification) = notifications.recv() => {
                    self.handle_notification(notification).await?;
                }
            }
            self.out.flush()?;
        }
        Ok(())
    }

    pub async fn execute(&mut self, command: ShellCommand) -> Result<Flow> {
        debug!(?command, "shell command");
        match command {
            ShellCommand::Open { path, output } => self.open(path, output).await?,
            ShellCommand::Close => self.viewer.close(),
            ShellCommand::Page(page) => {
                let result = self.viewer.page_selected(page);
                self.report(result)?;
            }
            ShellCommand::Next => {
                let result = self.viewer.next_page();
                self.report(result)?;
            }
            ShellCommand::Prev => {
                let result = self.viewer.previous_page();
                self.report(result)?;
            }
            ShellCommand::Back => {
                let result = self.viewer.back();
                self.report(result)?;
            }
            ShellCommand::Forward => {
                let result = self.viewer.forward();
                self.report(result)?;
            }
            ShellCommand::ZoomIn => {
                self.viewer.zoom_in();
            }
            ShellCommand::ZoomOut => {
                self.viewer.zoom_out();
            }
            ShellCommand::Zoom(factor) => {
                self.viewer.set_zoom(factor);
            }
            ShellCommand::Bookmarks => self.list_bookmarks()?,
            ShellCommand::Bookmark(index) => {
                let result = self.viewer.select_bookmark(index);
                self.report(result)?;
            }
            ShellCommand::Find(query) => {
                if let Err(err) = self.viewer.set_query(&query) {
                    writeln!(self.out, "{err:#}")?;
                }
            }
            ShellCommand::FindNext => {
                let result = self.viewer.find_next();
                self.report_hit(result)?;
            }
            ShellCommand::FindPrevious => {
                let result = self.viewer.find_previous();
                self.report_hit(result)?;
            }
            ShellCommand::Hit(ordinal) => {
                let result = self.viewer.select_hit(ordinal);
                self.report(result)?;
            }
            ShellCommand::Export { format, output } => self.export(format, output)?,
            ShellCommand::Cancel => {
                if !self.queue.cancel_active() {
                    writeln!(self.out, "no conversion is running")?;
                }
            }
            ShellCommand::Info => self.info()?,
            ShellCommand::Help => writeln!(self.out, "{HELP}")?,
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        self.flush_events()?;
        Ok(Flow::Continue)
    }

    /// Show a conversion outcome; a successful conversion started by `open`
    /// is opened in the viewer.
    pub async fn handle_notification(&mut self, notification: Notification) -> Result<()> {
        writeln!(self.out, "{notification}")?;
        if self.pending_open == Some(notification.job) {
            self.pending_open = None;
            if let Some(target) = notification.target() {
                self.open_pdf(target.clone()).await?;
            }
        }
        self.flush_events()
    }

    async fn open(&mut self, path: PathBuf, output: Option<PathBuf>) -> Result<()> {
        match route_open(&path, output) {
            OpenRoute::Direct(path) => self.open_pdf(path).await,
            OpenRoute::Convert(job) => {
                let source = job.source.clone();
                match self.queue.submit(job) {
                    Ok(ticket) => {
                        self.pending_open = Some(ticket.id);
                        writeln!(self.out, "converting {} to PDF...", source.display())?;
                    }
                    Err(err) => writeln!(self.out, "{err}")?,
                }
                Ok(())
            }
        }
    }

    async fn open_pdf(&mut self, path: PathBuf) -> Result<()> {
        if let Err(err) = self.viewer.open_with(self.provider.as_ref(), path).await {
            warn!(?err, "open failed");
            writeln!(self.out, "{err:#}")?;
        }
        Ok(())
    }

    fn export(&mut self, format: Format, output: Option<PathBuf>) -> Result<()> {
        let Some(session) = self.viewer.session() else {
            writeln!(self.out, "Please choose the PDF file first.")?;
            return Ok(());
        };
        let source = session.info().path.clone();
        let target = output.unwrap_or_else(|| default_output_path(&source, format));
        let mut job = ConversionJob::new(&source, target, format);

        let needs_content = Converter::select(job.source_format, format)
            .map(Converter::needs_content)
            .unwrap_or(false);
        if needs_content {
            match DocumentContent::from_backend(session.backend()) {
                Ok(content) => job = job.with_content(content),
                Err(err) => {
                    writeln!(self.out, "{err:#}")?;
                    return Ok(());
                }
            }
        }

        let target = job.target.clone();
        match self.queue.submit(job) {
            Ok(_) => writeln!(self.out, "exporting to {}...", target.display())?,
            Err(err) => writeln!(self.out, "{err}")?,
        }
        Ok(())
    }

    fn list_bookmarks(&mut self) -> Result<()> {
        let Some(session) = self.viewer.session() else {
            writeln!(self.out, "no document is open")?;
            return Ok(());
        };
        let entries = session.bookmarks().entries();
        if entries.is_empty() {
            writeln!(self.out, "no bookmarks")?;
        }
        for (idx, entry) in entries.iter().enumerate() {
            writeln!(
                self.out,
                "{:>3}. {}{} (page {})",
                idx + 1,
                "  ".repeat(entry.level),
                entry.title,
                entry.target_page + 1
            )?;
        }
        Ok(())
    }

    fn info(&mut self) -> Result<()> {
        let Some(session) = self.viewer.session() else {
            writeln!(self.out, "no document is open")?;
            return Ok(());
        };
        let info = session.info();
        writeln!(self.out, "file:    {}", info.path.display())?;
        writeln!(self.out, "title:   {}", session.title().unwrap_or("-"))?;
        if let Some(author) = &info.metadata.author {
            writeln!(self.out, "author:  {author}")?;
        }
        if !info.metadata.keywords.is_empty() {
            writeln!(self.out, "keywords: {}", info.metadata.keywords.join(", "))?;
        }
        writeln!(self.out, "pages:   {}", info.page_count)?;
        writeln!(self.out, "zoom:    {:.2}", self.viewer.zoom())?;
        let history = self.viewer.history();
        writeln!(
            self.out,
            "history: {} entries, back {}, forward {}",
            history.entries().len(),
            if history.back_available() { "yes" } else { "no" },
            if history.forward_available() { "yes" } else { "no" },
        )?;
        if let Some(summary) = self.viewer.search().summary() {
            let current = summary
                .current_index
                .map_or_else(|| "-".to_owned(), |idx| (idx + 1).to_string());
            writeln!(
                self.out,
                "search:  \"{}\", {} matches, at {}",
                summary.query, summary.total, current
            )?;
        }
        Ok(())
    }

    fn report<T>(&mut self, result: NavResult<T>) -> Result<()> {
        if let Err(err) = result {
            writeln!(self.out, "{err}")?;
        }
        Ok(())
    }

    fn report_hit<T>(&mut self, result: NavResult<Option<T>>) -> Result<()> {
        match result {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                writeln!(self.out, "no matches")?;
                Ok(())
            }
            Err(err) => {
                writeln!(self.out, "{err}")?;
                Ok(())
            }
        }
    }

    fn flush_events(&mut self) -> Result<()> {
        for event in self.events.drain() {
            match event {
                ViewerEvent::TitleChanged(title) => writeln!(self.out, "{title}")?,
                ViewerEvent::ZoomChanged(zoom) => writeln!(self.out, "zoom {zoom:.2}")?,
                ViewerEvent::SearchResultsChanged { query, total } if !query.is_empty() => {
                    writeln!(self.out, "{total} matches for \"{query}\"")?
                }
                ViewerEvent::HitSelected(hit) => writeln!(
                    self.out,
                    "match {} on page {}",
                    hit.ordinal + 1,
                    hit.page + 1
                )?,
                ViewerEvent::DocumentClosed(_) => writeln!(self.out, "document closed")?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use pdfview_convert::{
        ConversionConfig, ConversionPipeline, ChannelNotifier, ProcessLauncher,
    };
    use pdfview_core::{
        document_id_for_path, BookmarkEntry, DocumentBackend, DocumentInfo, DocumentMetadata,
        PointF, SearchMatch,
    };
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    struct StubDocument {
        info: DocumentInfo,
        pages: Vec<&'static str>,
    }

    impl DocumentBackend for StubDocument {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn bookmarks(&self) -> anyhow::Result<Vec<BookmarkEntry>> {
            Ok(vec![
                BookmarkEntry::new("Intro", 0, 0),
                BookmarkEntry::new("Results", 1, 2),
            ])
        }

        fn search(&self, query: &str) -> anyhow::Result<Vec<SearchMatch>> {
            Ok(self
                .pages
                .iter()
                .enumerate()
                .filter(|(_, text)| text.contains(query))
                .map(|(page, _)| SearchMatch {
                    page,
                    location: PointF::new(0.0, 10.0),
                })
                .collect())
        }

        fn page_text(&self, page_index: usize) -> anyhow::Result<String> {
            self.pages
                .get(page_index)
                .map(|text| text.to_string())
                .ok_or_else(|| anyhow::anyhow!("no page {page_index}"))
        }
    }

    struct StubProvider;

    #[async_trait::async_trait]
    impl DocumentProvider for StubProvider {
        async fn open(&self, path: &Path) -> anyhow::Result<Arc<dyn DocumentBackend>> {
            anyhow::ensure!(path.extension().map_or(false, |e| e == "pdf"), "not a pdf");
            Ok(Arc::new(StubDocument {
                info: DocumentInfo {
                    id: document_id_for_path(path),
                    path: path.to_path_buf(),
                    page_count: 3,
                    metadata: DocumentMetadata {
                        title: Some("Report".into()),
                        author: None,
                        keywords: vec!["quarterly".into(), "sales".into()],
                    },
                },
                pages: vec!["alpha", "beta", "alpha beta"],
            }))
        }
    }

    fn shell() -> (Shell<Vec<u8>>, mpsc::UnboundedReceiver<Notification>) {
        shell_with(ConversionConfig::default())
    }

    fn shell_with(
        config: ConversionConfig,
    ) -> (Shell<Vec<u8>>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline =
            ConversionPipeline::new(Arc::new(ProcessLauncher::from_config(&config)), config);
        let queue = ConversionQueue::new(
            pipeline,
            Arc::new(ChannelNotifier::new(tx)),
            Handle::current(),
        );
        let shell = Shell::new(
            ViewerConfig::default(),
            Arc::new(StubProvider),
            queue,
            Vec::new(),
        );
        (shell, rx)
    }

    fn output(shell: &Shell<Vec<u8>>) -> String {
        String::from_utf8_lossy(shell.output()).into_owned()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(ShellCommand::parse("   "), Ok(None));
        assert_eq!(ShellCommand::parse("page 3"), Ok(Some(ShellCommand::Page(2))));
        assert_eq!(
            ShellCommand::parse("/net income"),
            Ok(Some(ShellCommand::Find("net income".into())))
        );
        assert_eq!(ShellCommand::parse("N"), Ok(Some(ShellCommand::FindPrevious)));
        assert_eq!(ShellCommand::parse("zoom +"), Ok(Some(ShellCommand::ZoomIn)));
        assert_eq!(ShellCommand::parse("zoom 1.5"), Ok(Some(ShellCommand::Zoom(1.5))));
        assert_eq!(
            ShellCommand::parse("open deck.pptx /tmp/deck.pdf"),
            Ok(Some(ShellCommand::Open {
                path: "deck.pptx".into(),
                output: Some("/tmp/deck.pdf".into())
            }))
        );
        assert_eq!(
            ShellCommand::parse("export excel"),
            Ok(Some(ShellCommand::Export {
                format: Format::Excel,
                output: None
            }))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ShellCommand::parse("page 0").is_err());
        assert!(ShellCommand::parse("page x").is_err());
        assert!(ShellCommand::parse("export pdf").is_err());
        assert!(ShellCommand::parse("open").is_err());
        assert!(ShellCommand::parse("frobnicate").is_err());
    }

    #[tokio::test]
    async fn navigation_prints_window_titles() {
        let (mut shell, _rx) = shell();
        shell
            .execute(ShellCommand::Open {
                path: "/docs/report.pdf".into(),
                output: None,
            })
            .await
            .unwrap();
        shell.execute(ShellCommand::Page(2)).await.unwrap();
        shell.execute(ShellCommand::Next).await.unwrap();
        shell.execute(ShellCommand::Back).await.unwrap();

        let out = output(&shell);
        assert!(out.contains("Report: page 1 (1 of 3)"));
        assert!(out.contains("Report: page 3 (3 of 3)"));
        assert!(out.contains("out of range"));
        assert_eq!(shell.viewer().current_location().map(|l| l.page), Some(0));
    }

    #[tokio::test]
    async fn search_steps_through_matches() {
        let (mut shell, _rx) = shell();
        shell
            .execute(ShellCommand::Open {
                path: "/docs/report.pdf".into(),
                output: None,
            })
            .await
            .unwrap();
        shell.execute(ShellCommand::Find("alpha".into())).await.unwrap();
        shell.execute(ShellCommand::FindNext).await.unwrap();
        shell.execute(ShellCommand::FindNext).await.unwrap();

        let out = output(&shell);
        assert!(out.contains("2 matches for \"alpha\""));
        assert!(out.contains("match 2 on page 3"));
    }

    #[tokio::test]
    async fn info_lists_document_metadata() {
        let (mut shell, _rx) = shell();
        shell
            .execute(ShellCommand::Open {
                path: "/docs/report.pdf".into(),
                output: None,
            })
            .await
            .unwrap();
        shell.execute(ShellCommand::Info).await.unwrap();

        let out = output(&shell);
        assert!(out.contains("title:   Report"));
        assert!(out.contains("keywords: quarterly, sales"));
        assert!(out.contains("pages:   3"));
        assert!(!out.contains("author:"));
    }

    #[tokio::test]
    async fn export_requires_an_open_document() {
        let (mut shell, _rx) = shell();
        shell
            .execute(ShellCommand::Export {
                format: Format::Word,
                output: None,
            })
            .await
            .unwrap();
        assert!(output(&shell).contains("Please choose the PDF file first."));
    }

    #[tokio::test]
    async fn failed_conversion_on_open_leaves_viewer_empty() {
        let (mut shell, mut rx) = shell();
        shell
            .execute(ShellCommand::Open {
                path: "/docs/deck.pptx".into(),
                output: None,
            })
            .await
            .unwrap();
        let notification = rx.recv().await.unwrap();
        shell.handle_notification(notification).await.unwrap();

        let out = output(&shell);
        assert!(out.contains("converting /docs/deck.pptx to PDF..."));
        assert!(out.contains("Microsoft PowerPoint is not installed."));
        assert!(shell.viewer().session().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn converted_presentation_opens_on_first_page() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.pptx");
        std::fs::write(&source, b"pptx").unwrap();
        let mut config = ConversionConfig::default();
        config.powerpoint.command = vec![
            "sh".into(),
            "-c".into(),
            r#"echo '{"ready":true}'; while read line; do echo '{"ok":1}'; done"#.into(),
        ];
        let (mut shell, mut rx) = shell_with(config);

        shell
            .execute(ShellCommand::Open {
                path: source,
                output: Some(dir.path().join("out.pdf")),
            })
            .await
            .unwrap();
        let notification = rx.recv().await.unwrap();
        assert!(notification.is_success());
        shell.handle_notification(notification).await.unwrap();

        let session = shell.viewer().session().unwrap();
        assert_eq!(session.info().path, dir.path().join("out.pdf"));
        assert_eq!(session.current_page(), 0);
        assert!(output(&shell).contains("Document saved at:"));
    }

    #[tokio::test]
    async fn run_stops_on_quit() {
        let (mut shell, notifications) = shell();
        let (tx, lines) = mpsc::unbounded_channel();
        for line in ["open /docs/report.pdf", "bookmarks", "bogus", "quit", "page 2"] {
            tx.send(line.to_owned()).unwrap();
        }
        shell.run(lines, notifications).await.unwrap();

        let out = output(&shell);
        assert!(out.contains("  1. Intro (page 1)"));
        assert!(out.contains("  2.   Results (page 3)"));
        assert!(out.contains("unknown command 'bogus'"));
        assert!(!out.contains("page 2 (2 of 3)"));
    }
}
