//! View controller: which practitioner view is on screen.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::intake::GateState;

/// Practitioner views.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Directory,
    NewClient,
    ClientDetail,
    NewSession,
    SessionDetail,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Directory,
        View::NewClient,
        View::ClientDetail,
        View::NewSession,
        View::SessionDetail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            View::Directory => "directory",
            View::NewClient => "newClient",
            View::ClientDetail => "clientDetail",
            View::NewSession => "newSession",
            View::SessionDetail => "sessionDetail",
        }
    }

    pub fn from_name(name: &str) -> Option<View> {
        View::ALL.into_iter().find(|v| v.name() == name)
    }
}

/// Navigation tabs shown in the header.
///
/// The directory tab is always shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tabs {
    pub new_client: bool,
    pub client_detail: bool,
    pub new_session: bool,
    pub session_detail: bool,
}

impl Default for Tabs {
    fn default() -> Self {
        Self {
            new_client: true,
            client_detail: false,
            new_session: false,
            session_detail: false,
        }
    }
}

impl Tabs {
    pub fn is_visible(&self, view: View) -> bool {
        match view {
            View::Directory => true,
            View::NewClient => self.new_client,
            View::ClientDetail => self.client_detail,
            View::NewSession => self.new_session,
            View::SessionDetail => self.session_detail,
        }
    }

    fn reveal(&mut self, view: View) {
        match view {
            View::Directory => *self = Tabs::default(),
            View::NewClient => self.new_client = true,
            View::ClientDetail => self.client_detail = true,
            View::NewSession => self.new_session = true,
            View::SessionDetail => self.session_detail = true,
        }
    }
}

/// Result of a view switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// The gate is not in normal mode; nothing changed.
    Blocked,
    /// The view is shown; the directory must be reloaded when asked.
    Shown { reload_directory: bool },
}

/// Current view and tab visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewController {
    current: View,
    tabs: Tabs,
}

impl Default for ViewController {
    fn default() -> Self {
        Self {
            current: View::Directory,
            tabs: Tabs::default(),
        }
    }
}

impl ViewController {
    pub fn current(&self) -> View {
        self.current
    }

    pub fn tabs(&self) -> Tabs {
        self.tabs
    }

    /// Switch views. A no-op unless the gate is in normal mode.
    pub fn switch_to(&mut self, gate: &GateState, view: View) -> ViewChange {
        if !gate.is_normal() {
            info!(view = view.name(), gate = gate.name(), "View change blocked while intake is active");
            return ViewChange::Blocked;
        }
        self.current = view;
        self.tabs.reveal(view);
        debug!(view = view.name(), "Switched view");
        ViewChange::Shown {
            reload_directory: view == View::Directory,
        }
    }

    /// Whether a view is on screen. Nothing practitioner-facing is visible
    /// outside normal mode.
    pub fn is_visible(&self, gate: &GateState, view: View) -> bool {
        gate.is_normal() && self.current == view
    }

    /// Header navigation is hidden outside normal mode.
    pub fn nav_visible(&self, gate: &GateState) -> bool {
        gate.is_normal()
    }
}
