//! Application state for the TUI.

use std::sync::Arc;

use agentop_core::{Agent, AgentStatus, Snapshot, SortKey};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;

/// Main application state.
pub struct App {
    /// Latest published snapshot
    pub snapshot: Arc<Snapshot>,
    /// Current sort order for the agent table
    pub sort_key: SortKey,
    /// Status filter; `None` shows all agents
    pub status_filter: Option<AgentStatus>,
    /// Table selection state
    pub table_state: TableState,
    /// Set by `r`; the main loop forwards it to the monitor and clears it
    pub refresh_requested: bool,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(Snapshot::default()),
            sort_key: SortKey::default(),
            status_filter: None,
            table_state: TableState::default(),
            refresh_requested: false,
            should_quit: false,
        }
    }

    /// Replace the displayed snapshot, clamping the selection to the new
    /// row count.
    pub fn update(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshot = snapshot;
        let rows = self.visible_agents().len();
        if rows == 0 {
            self.table_state.select(None);
        } else if let Some(selected) = self.table_state.selected() {
            if selected >= rows {
                self.table_state.select(Some(rows - 1));
            }
        } else {
            self.table_state.select(Some(0));
        }
    }

    /// Agents visible under the current filter, in the current sort order.
    pub fn visible_agents(&self) -> Vec<&Agent> {
        self.snapshot
            .agents_filtered(self.status_filter, self.sort_key)
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('s') => self.sort_key = self.sort_key.next(),
            KeyCode::Char('f') => self.cycle_filter(),
            KeyCode::Char('r') => self.refresh_requested = true,
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            _ => {}
        }
    }

    fn cycle_filter(&mut self) {
        self.status_filter = match self.status_filter {
            None => Some(AgentStatus::Active),
            Some(AgentStatus::Active) => Some(AgentStatus::Idle),
            Some(AgentStatus::Idle) => Some(AgentStatus::WaitingForUser),
            Some(AgentStatus::WaitingForUser) => Some(AgentStatus::Stopped),
            Some(AgentStatus::Stopped) => None,
        };
        self.table_state.select(None);
    }

    fn select_next(&mut self) {
        let rows = self.visible_agents().len();
        if rows == 0 {
            return;
        }
        let next = match self.table_state.selected() {
            Some(i) if i + 1 < rows => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.table_state.select(Some(next));
    }

    fn select_previous(&mut self) {
        if self.visible_agents().is_empty() {
            return;
        }
        let prev = match self.table_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.table_state.select(Some(prev));
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_quit_key() {
        let mut app = App::new();
        app.handle_key(key('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_sort_key_cycles() {
        let mut app = App::new();
        assert_eq!(app.sort_key, SortKey::LastActivity);
        app.handle_key(key('s'));
        assert_eq!(app.sort_key, SortKey::Cost);
        app.handle_key(key('s'));
        app.handle_key(key('s'));
        app.handle_key(key('s'));
        assert_eq!(app.sort_key, SortKey::LastActivity);
    }

    #[test]
    fn test_filter_cycles_back_to_all() {
        let mut app = App::new();
        assert!(app.status_filter.is_none());
        app.handle_key(key('f'));
        assert_eq!(app.status_filter, Some(AgentStatus::Active));
        for _ in 0..4 {
            app.handle_key(key('f'));
        }
        assert!(app.status_filter.is_none());
    }

    #[test]
    fn test_refresh_request_flag() {
        let mut app = App::new();
        app.handle_key(key('r'));
        assert!(app.refresh_requested);
    }
}
