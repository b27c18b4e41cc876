use std::collections::HashMap;

use crate::host::Handle;

/// Identifies one registration, so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<L> {
    id: ListenerId,
    listener: L,
}

/// Listeners keyed by node handle and event type.
///
/// Keys are handles, not proxies, so every proxy of a node shares one entry.
/// Registrations are kept in order and never deduplicated.
pub struct ListenerRegistry<L> {
    entries: HashMap<Handle, HashMap<String, Vec<Registration<L>>>>,
    next_id: u64,
}

impl<L> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<L> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: Handle, event_type: &str, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries
            .entry(handle)
            .or_default()
            .entry(event_type.to_string())
            .or_default()
            .push(Registration { id, listener });
        id
    }

    /// Listeners for `(handle, event_type)` in registration order; empty when none.
    pub fn iter_for<'a>(
        &'a self,
        handle: Handle,
        event_type: &str,
    ) -> impl Iterator<Item = &'a L> + 'a {
        self.entries
            .get(&handle)
            .and_then(|types| types.get(event_type))
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|registration| &registration.listener)
    }

    pub fn listeners_for(&self, handle: Handle, event_type: &str) -> Vec<L>
    where
        L: Clone,
    {
        self.iter_for(handle, event_type).cloned().collect()
    }

    pub fn count(&self, handle: Handle, event_type: &str) -> usize {
        self.iter_for(handle, event_type).count()
    }

    pub fn remove(&mut self, handle: Handle, event_type: &str, id: ListenerId) -> bool {
        self.remove_where(handle, event_type, |registration| registration.id == id)
    }

    /// Remove the earliest registration whose listener satisfies `matches`.
    pub fn remove_first(
        &mut self,
        handle: Handle,
        event_type: &str,
        mut matches: impl FnMut(&L) -> bool,
    ) -> bool {
        self.remove_where(handle, event_type, |registration| {
            matches(&registration.listener)
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_where(
        &mut self,
        handle: Handle,
        event_type: &str,
        predicate: impl FnMut(&Registration<L>) -> bool,
    ) -> bool {
        let Some(types) = self.entries.get_mut(&handle) else {
            return false;
        };
        let Some(registrations) = types.get_mut(event_type) else {
            return false;
        };
        let Some(position) = registrations.iter().position(predicate) else {
            return false;
        };
        registrations.remove(position);
        if registrations.is_empty() {
            types.remove(event_type);
        }
        if types.is_empty() {
            self.entries.remove(&handle);
        }
        true
    }
}
