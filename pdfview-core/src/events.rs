use std::sync::Arc;

use parking_lot::Mutex;

use crate::location::PageLocation;
use crate::search::SearchHit;
use crate::DocumentId;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    DocumentOpened(DocumentId),
    DocumentClosed(DocumentId),
    CurrentChanged(PageLocation),
    BackAvailableChanged(bool),
    ForwardAvailableChanged(bool),
    ZoomChanged(f32),
    TitleChanged(String),
    SearchResultsChanged { query: String, total: usize },
    ResultsViewActivated,
    HitSelected(SearchHit),
    HighlightChanged(Option<usize>),
}

/// Receives viewer notifications. Every method defaults to a no-op so a
/// widget layer only implements the notifications it displays.
pub trait ViewerObserver: Send + Sync {
    fn on_document_opened(&self, _id: DocumentId) {}
    fn on_document_closed(&self, _id: DocumentId) {}
    fn on_current_changed(&self, _location: &PageLocation) {}
    fn on_back_available_changed(&self, _available: bool) {}
    fn on_forward_available_changed(&self, _available: bool) {}
    fn on_zoom_changed(&self, _zoom: f32) {}
    fn on_title_changed(&self, _title: &str) {}
    fn on_search_results_changed(&self, _query: &str, _total: usize) {}
    fn on_results_view_activated(&self) {}
    fn on_hit_selected(&self, _hit: &SearchHit) {}
    fn on_highlight_changed(&self, _ordinal: Option<usize>) {}
}

pub(crate) fn dispatch(observer: &dyn ViewerObserver, event: &ViewerEvent) {
    match event {
        ViewerEvent::DocumentOpened(id) => observer.on_document_opened(*id),
        ViewerEvent::DocumentClosed(id) => observer.on_document_closed(*id),
        ViewerEvent::CurrentChanged(location) => observer.on_current_changed(location),
        ViewerEvent::BackAvailableChanged(available) => {
            observer.on_back_available_changed(*available)
        }
        ViewerEvent::ForwardAvailableChanged(available) => {
            observer.on_forward_available_changed(*available)
        }
        ViewerEvent::ZoomChanged(zoom) => observer.on_zoom_changed(*zoom),
        ViewerEvent::TitleChanged(title) => observer.on_title_changed(title),
        ViewerEvent::SearchResultsChanged { query, total } => {
            observer.on_search_results_changed(query, *total)
        }
        ViewerEvent::ResultsViewActivated => observer.on_results_view_activated(),
        ViewerEvent::HitSelected(hit) => observer.on_hit_selected(hit),
        ViewerEvent::HighlightChanged(ordinal) => observer.on_highlight_changed(*ordinal),
    }
}

/// Observer that records every notification, for front ends that poll and
/// for tests.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ViewerEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ViewerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn snapshot(&self) -> Vec<ViewerEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: ViewerEvent) {
        self.events.lock().push(event);
    }
}

impl ViewerObserver for EventLog {
    fn on_document_opened(&self, id: DocumentId) {
        self.push(ViewerEvent::DocumentOpened(id));
    }

    fn on_document_closed(&self, id: DocumentId) {
        self.push(ViewerEvent::DocumentClosed(id));
    }

    fn on_current_changed(&self, location: &PageLocation) {
        self.push(ViewerEvent::CurrentChanged(*location));
    }

    fn on_back_available_changed(&self, available: bool) {
        self.push(ViewerEvent::BackAvailableChanged(available));
    }

    fn on_forward_available_changed(&self, available: bool) {
        self.push(ViewerEvent::ForwardAvailableChanged(available));
    }

    fn on_zoom_changed(&self, zoom: f32) {
        self.push(ViewerEvent::ZoomChanged(zoom));
    }

    fn on_title_changed(&self, title: &str) {
        self.push(ViewerEvent::TitleChanged(title.to_owned()));
    }

    fn on_search_results_changed(&self, query: &str, total: usize) {
        self.push(ViewerEvent::SearchResultsChanged {
            query: query.to_owned(),
            total,
        });
    }

    fn on_results_view_activated(&self) {
        self.push(ViewerEvent::ResultsViewActivated);
    }

    fn on_hit_selected(&self, hit: &SearchHit) {
        self.push(ViewerEvent::HitSelected(*hit));
    }

    fn on_highlight_changed(&self, ordinal: Option<usize>) {
        self.push(ViewerEvent::HighlightChanged(ordinal));
    }
}
