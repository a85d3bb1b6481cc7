use ratatui::Frame;
use setwise::{clock::Clock, store::KvStore};

use crate::{
    ui::{render_help, render_summary},
    App, AppState,
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen<S: KvStore, C: Clock> {
    fn render(&self, app: &App<S, C>, f: &mut Frame);
}

/// Live session - renders the session using the App widget
pub struct SessionScreen;

impl<S: KvStore, C: Clock> Screen<S, C> for SessionScreen {
    fn render(&self, app: &App<S, C>, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
}

/// Shown once the workout is finished
pub struct SummaryScreen;

impl<S: KvStore, C: Clock> Screen<S, C> for SummaryScreen {
    fn render(&self, app: &App<S, C>, f: &mut Frame) {
        render_summary(app, f.area(), f.buffer_mut());
    }
}

pub struct HelpScreen;

impl<S: KvStore, C: Clock> Screen<S, C> for HelpScreen {
    fn render(&self, _app: &App<S, C>, f: &mut Frame) {
        let area = f.area();
        render_help(area, f.buffer_mut());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen<S: KvStore, C: Clock>(state: &AppState) -> Box<dyn Screen<S, C>> {
    match state {
        AppState::Session => Box::new(SessionScreen),
        AppState::Summary => Box::new(SummaryScreen),
        AppState::Help => Box::new(HelpScreen),
    }
}
