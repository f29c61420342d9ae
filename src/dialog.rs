//! Create/edit dialog state.

use std::cell::Cell as Flag;
use std::rc::Rc;

use tracing::debug;

use crate::reactive::Cell;

/// Where a dialog stands.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogState<E> {
    Closed,
    OpenCreate,
    /// Editing a snapshot of the entity taken when the dialog opened.
    OpenEdit(E),
}

impl<E> DialogState<E> {
    pub fn is_open(&self) -> bool {
        !matches!(self, DialogState::Closed)
    }

    pub fn target(&self) -> Option<&E> {
        match self {
            DialogState::OpenEdit(entity) => Some(entity),
            _ => None,
        }
    }
}

/// Identifies the dialog transition an async action started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogTicket(u64);

/// One dialog purpose of one view-model.
///
/// Row-level edit buttons all call [`Dialog::open_with`] on the same
/// instance; the last call wins. The state lives in a reactive [`Cell`] so
/// derived values can depend on it.
pub struct Dialog<E> {
    name: &'static str,
    state: Cell<DialogState<E>>,
    generation: Rc<Flag<u64>>,
}

impl<E> Clone for Dialog<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: self.state.clone(),
            generation: Rc::clone(&self.generation),
        }
    }
}

impl<E: Clone + PartialEq + 'static> Dialog<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Cell::new(DialogState::Closed),
            generation: Rc::new(Flag::new(0)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enter create mode, discarding any edit target.
    pub fn open(&self) {
        self.transition(DialogState::OpenCreate);
    }

    /// Enter edit mode for `entity`, replacing any previous target.
    pub fn open_with(&self, entity: E) {
        self.transition(DialogState::OpenEdit(entity));
    }

    /// Close and drop the captured target.
    pub fn close(&self) {
        self.transition(DialogState::Closed);
    }

    /// Capture the current generation before starting async work.
    pub fn ticket(&self) -> DialogTicket {
        DialogTicket(self.generation.get())
    }

    /// Close only if nothing happened to the dialog since `ticket` was taken.
    ///
    /// Returns whether it closed.
    pub fn close_if_current(&self, ticket: DialogTicket) -> bool {
        if ticket.0 != self.generation.get() {
            debug!(dialog = self.name, "dialog moved on, leaving it as is");
            return false;
        }
        self.close();
        true
    }

    /// Tracked read of the whole state.
    pub fn state(&self) -> DialogState<E> {
        self.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state.with(DialogState::is_open)
    }

    pub fn target(&self) -> Option<E> {
        self.state.with(|state| state.target().cloned())
    }

    pub fn target_untracked(&self) -> Option<E> {
        self.state.get_untracked().target().cloned()
    }

    fn transition(&self, next: DialogState<E>) {
        self.generation.set(self.generation.get() + 1);
        debug!(
            dialog = self.name,
            open = next.is_open(),
            editing = next.target().is_some(),
            "dialog transition"
        );
        self.state.set(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Derived;

    #[test]
    fn test_open_states() {
        let dialog: Dialog<String> = Dialog::new("edit");
        assert_eq!(dialog.state(), DialogState::Closed);

        dialog.open();
        assert_eq!(dialog.state(), DialogState::OpenCreate);
        assert!(dialog.is_open());
        assert_eq!(dialog.target(), None);

        dialog.open_with("e1".to_string());
        dialog.open();
        assert_eq!(dialog.state(), DialogState::OpenCreate);
        assert_eq!(dialog.target(), None);
    }

    #[test]
    fn test_last_target_wins() {
        let dialog = Dialog::new("edit");
        dialog.open_with(vec!["e1"]);
        dialog.open_with(vec!["e2"]);
        assert_eq!(dialog.target(), Some(vec!["e2"]));
    }

    #[test]
    fn test_close_clears_target() {
        let dialog = Dialog::new("edit");
        for start in [
            DialogState::Closed,
            DialogState::OpenCreate,
            DialogState::OpenEdit(7),
        ] {
            dialog.transition(start);
            dialog.close();
            assert_eq!(dialog.target(), None);
            assert!(!dialog.is_open());
        }
    }

    #[test]
    fn test_stale_ticket_does_not_close() {
        let dialog = Dialog::new("edit");
        dialog.open_with(1);
        let ticket = dialog.ticket();

        dialog.open_with(2);
        assert!(!dialog.close_if_current(ticket));
        assert_eq!(dialog.target(), Some(2));

        let ticket = dialog.ticket();
        assert!(dialog.close_if_current(ticket));
        assert!(!dialog.is_open());
    }

    #[test]
    fn test_derived_values_follow_dialog() {
        let dialog = Dialog::new("edit");
        let title = {
            let dialog = dialog.clone();
            Derived::new(move || match dialog.target() {
                Some(name) => format!("Edit {name}"),
                None => "New".to_string(),
            })
        };
        assert_eq!(title.get(), "New");
        dialog.open_with("Spring".to_string());
        assert_eq!(title.get(), "Edit Spring");
        dialog.close();
        assert_eq!(title.get(), "New");
    }
}
