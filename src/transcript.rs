/// Identifies a transcript entry. Ids are allocated from a counter that is
/// not reset by `clear`, so an id from a cleared conversation can never
/// match an entry in a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Entry content. `Pending` is the typing placeholder shown while the
/// request for this entry is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Pending,
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub id: EntryId,
    pub role: Role,
    pub body: Body,
}

/// Ordered chat transcript. Entries are append-only, except that a pending
/// entry is replaced in place exactly once when its request settles.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, role: Role, body: Body) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, role, body });
        id
    }

    pub fn push_user(&mut self, text: String) -> EntryId {
        self.push(Role::User, Body::Text(text))
    }

    /// Append a pending assistant entry and return its id.
    pub fn push_pending(&mut self) -> EntryId {
        self.push(Role::Assistant, Body::Pending)
    }

    /// Replace a pending entry's body with its final text. Returns false if
    /// the entry no longer exists (conversation was reset) or was already
    /// resolved, in which case nothing changes.
    pub fn resolve(&mut self, id: EntryId, text: String) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.body == Body::Pending => {
                entry.body = Body::Text(text);
                true
            }
            _ => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.body == Body::Pending)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_then_pending_appended_in_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("what is the answer".to_string());
        let pending = transcript.push_pending();

        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].body, Body::Text("what is the answer".to_string()));
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].body, Body::Pending);
        // The placeholder is the last entry at submission time
        assert_eq!(entries.last().unwrap().id, pending);
    }

    #[test]
    fn resolve_replaces_pending_exactly_once() {
        let mut transcript = Transcript::new();
        transcript.push_user("q".to_string());
        let id = transcript.push_pending();

        assert!(transcript.resolve(id, "42".to_string()));
        assert_eq!(transcript.entries()[1].body, Body::Text("42".to_string()));

        // A second resolution of the same id changes nothing
        assert!(!transcript.resolve(id, "later".to_string()));
        assert_eq!(transcript.entries()[1].body, Body::Text("42".to_string()));
    }

    #[test]
    fn resolve_after_clear_is_a_noop() {
        let mut transcript = Transcript::new();
        transcript.push_user("q".to_string());
        let id = transcript.push_pending();
        transcript.clear();

        assert!(!transcript.resolve(id, "too late".to_string()));
        assert!(transcript.is_empty());
    }

    #[test]
    fn ids_are_not_reused_across_clear() {
        let mut transcript = Transcript::new();
        let before = transcript.push_pending();
        transcript.clear();
        let after = transcript.push_pending();

        assert_ne!(before, after);
        // Resolving the stale id must not touch the new placeholder
        assert!(!transcript.resolve(before, "stale".to_string()));
        assert_eq!(transcript.entries()[0].body, Body::Pending);
    }

    #[test]
    fn has_pending_tracks_unresolved_placeholders() {
        let mut transcript = Transcript::new();
        assert!(!transcript.has_pending());

        let id = transcript.push_pending();
        assert!(transcript.has_pending());

        transcript.resolve(id, "done".to_string());
        assert!(!transcript.has_pending());
    }
}
