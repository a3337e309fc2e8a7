use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::config::ViewerConfig;
use crate::error::{NavError, NavResult};
use crate::events::{dispatch, ViewerEvent, ViewerObserver};
use crate::history::{NavigationHistory, DEFAULT_ZOOM};
use crate::location::{PageLocation, PointF};
use crate::search::{SearchCoordinator, SearchHit, SearchState};
use crate::session::{DocumentSession, DEFAULT_WINDOW_TITLE};
use crate::{DocumentBackend, DocumentProvider};

/// Coordinates the open document with navigation history, bookmarks and
/// search, and reports every visible change to the subscribed observers.
///
/// Search cursor and viewport move together: selecting a hit always issues
/// the matching jump, and a hit whose jump is refused is not selected.
pub struct Viewer {
    config: ViewerConfig,
    session: Option<DocumentSession>,
    history: NavigationHistory,
    search: SearchCoordinator,
    zoom: f32,
    highlight: Option<usize>,
    observers: Vec<Arc<dyn ViewerObserver>>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let zoom = config.clamp_zoom(DEFAULT_ZOOM);
        Self {
            config,
            session: None,
            history: NavigationHistory::default(),
            search: SearchCoordinator::new(),
            zoom,
            highlight: None,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Arc<dyn ViewerObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&DocumentSession> {
        self.session.as_ref()
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn search(&self) -> &SearchCoordinator {
        &self.search
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Ordinal of the search hit the viewport highlights as active.
    pub fn highlight(&self) -> Option<usize> {
        self.highlight
    }

    pub fn current_location(&self) -> Option<PageLocation> {
        self.history.current()
    }

    pub fn window_title(&self) -> String {
        self.session
            .as_ref()
            .map_or_else(|| DEFAULT_WINDOW_TITLE.to_owned(), |s| s.window_title())
    }

    #[instrument(skip(self, provider))]
    pub async fn open_with<P: DocumentProvider + ?Sized>(
        &mut self,
        provider: &P,
        path: PathBuf,
    ) -> Result<()> {
        let session = DocumentSession::open_with(provider, path).await?;
        self.install(session);
        Ok(())
    }

    /// Make `backend` the active document, replacing any previous one, and
    /// show its first page.
    pub fn open_backend(&mut self, backend: Arc<dyn DocumentBackend>) {
        self.install(DocumentSession::new(backend));
    }

    fn install(&mut self, session: DocumentSession) {
        self.close();
        info!(
            path = %session.info().path.display(),
            pages = session.page_count(),
            "document opened"
        );
        self.history.reset(session.page_count());
        let id = session.id();
        let has_pages = session.page_count() > 0;
        self.session = Some(session);
        self.emit(ViewerEvent::DocumentOpened(id));
        if has_pages {
            // a fresh history always has room for page 0
            let _ = self.page_selected(0);
        } else {
            self.emit(ViewerEvent::TitleChanged(self.window_title()));
        }
    }

    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.emit(ViewerEvent::DocumentClosed(session.id()));
        let had_back = self.history.back_available();
        let had_forward = self.history.forward_available();
        self.history.reset(0);
        self.clear_search();
        if had_back {
            self.emit(ViewerEvent::BackAvailableChanged(false));
        }
        if had_forward {
            self.emit(ViewerEvent::ForwardAvailableChanged(false));
        }
    }

    /// Record a new location and move the viewport there. A zoom that is not
    /// a positive number keeps the viewport's current zoom; anything else is
    /// clamped to the configured bounds before it reaches the history.
    pub fn jump(
        &mut self,
        page: usize,
        offset: Option<PointF>,
        zoom: f32,
    ) -> NavResult<PageLocation> {
        if self.session.is_none() {
            return Err(NavError::NoDocument);
        }
        let had_back = self.history.back_available();
        let had_forward = self.history.forward_available();
        let zoom = if zoom.is_finite() && zoom > 0.0 {
            self.config.clamp_zoom(zoom)
        } else {
            self.zoom
        };
        let location = self.history.jump(page, offset, zoom)?;
        self.show(location, had_back, had_forward);
        Ok(location)
    }

    /// Page-selector and thumbnail path: jump keeping the current zoom.
    pub fn page_selected(&mut self, page: usize) -> NavResult<PageLocation> {
        self.jump(page, None, self.zoom)
    }

    pub fn next_page(&mut self) -> NavResult<PageLocation> {
        let current = self.current_page()?;
        self.page_selected(current + 1)
    }

    pub fn previous_page(&mut self) -> NavResult<PageLocation> {
        let current = self.current_page()?;
        let page_count = self.history.page_count();
        let previous = current.checked_sub(1).ok_or(NavError::OutOfRange {
            page: 0,
            page_count,
        })?;
        self.page_selected(previous)
    }

    pub fn back(&mut self) -> NavResult<PageLocation> {
        if self.session.is_none() {
            return Err(NavError::NoDocument);
        }
        let had_back = self.history.back_available();
        let had_forward = self.history.forward_available();
        let location = self.history.back()?;
        self.show(location, had_back, had_forward);
        Ok(location)
    }

    pub fn forward(&mut self) -> NavResult<PageLocation> {
        if self.session.is_none() {
            return Err(NavError::NoDocument);
        }
        let had_back = self.history.back_available();
        let had_forward = self.history.forward_available();
        let location = self.history.forward()?;
        self.show(location, had_back, had_forward);
        Ok(location)
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom * self.config.zoom_step())
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom / self.config.zoom_step())
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let zoom = self.config.clamp_zoom(zoom);
        if (zoom - self.zoom).abs() > f32::EPSILON {
            self.zoom = zoom;
            self.emit(ViewerEvent::ZoomChanged(zoom));
        }
        self.zoom
    }

    pub fn select_bookmark(&mut self, index: usize) -> NavResult<PageLocation> {
        let session = self.session.as_ref().ok_or(NavError::NoDocument)?;
        let target = session.bookmarks().resolve_index(index)?;
        self.jump(target.page, target.offset, target.zoom)
    }

    pub fn set_query(&mut self, text: &str) -> Result<SearchState> {
        if text.is_empty() {
            self.clear_search();
            return Ok(SearchState::Idle);
        }
        let session = self.session.as_ref().ok_or(NavError::NoDocument)?;
        let result = self.search.set_query(text, session.backend());
        self.set_highlight(None);
        let total = self.search.hits().len();
        self.emit(ViewerEvent::SearchResultsChanged {
            query: text.to_owned(),
            total,
        });
        self.emit(ViewerEvent::ResultsViewActivated);
        result
    }

    pub fn select_hit(&mut self, ordinal: usize) -> NavResult<SearchHit> {
        let hit = self.search.hit(ordinal)?;
        self.jump(hit.page, Some(hit.location), self.zoom)?;
        let hit = self.search.select(ordinal)?;
        self.set_highlight(Some(ordinal));
        self.emit(ViewerEvent::HitSelected(hit));
        Ok(hit)
    }

    /// Move to the following hit, wrapping around. `Ok(None)` when the
    /// query has no hits.
    pub fn find_next(&mut self) -> NavResult<Option<SearchHit>> {
        match self.search.next_ordinal() {
            Some(ordinal) => self.select_hit(ordinal).map(Some),
            None => Ok(None),
        }
    }

    pub fn find_previous(&mut self) -> NavResult<Option<SearchHit>> {
        match self.search.previous_ordinal() {
            Some(ordinal) => self.select_hit(ordinal).map(Some),
            None => Ok(None),
        }
    }

    fn clear_search(&mut self) {
        let was_active = self.search.state() == SearchState::QueryActive;
        self.search.clear();
        self.set_highlight(None);
        if was_active {
            self.emit(ViewerEvent::SearchResultsChanged {
                query: String::new(),
                total: 0,
            });
        }
    }

    fn set_highlight(&mut self, ordinal: Option<usize>) {
        if self.highlight != ordinal {
            self.highlight = ordinal;
            self.emit(ViewerEvent::HighlightChanged(ordinal));
        }
    }

    fn current_page(&self) -> NavResult<usize> {
        let session = self.session.as_ref().ok_or(NavError::NoDocument)?;
        Ok(session.current_page())
    }

    fn show(&mut self, location: PageLocation, had_back: bool, had_forward: bool) {
        if let Some(session) = self.session.as_mut() {
            session.set_current_page(location.page);
        }
        debug!(page = location.page, zoom = location.zoom, "viewport moved");
        self.emit(ViewerEvent::CurrentChanged(location));

        let back = self.history.back_available();
        if back != had_back {
            self.emit(ViewerEvent::BackAvailableChanged(back));
        }
        let forward = self.history.forward_available();
        if forward != had_forward {
            self.emit(ViewerEvent::ForwardAvailableChanged(forward));
        }

        let zoom = self.config.clamp_zoom(location.zoom);
        if (zoom - self.zoom).abs() > f32::EPSILON {
            self.zoom = zoom;
            self.emit(ViewerEvent::ZoomChanged(zoom));
        }
        self.emit(ViewerEvent::TitleChanged(self.window_title()));
    }

    fn emit(&self, event: ViewerEvent) {
        for observer in &self.observers {
            dispatch(observer.as_ref(), &event);
        }
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}
