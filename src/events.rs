use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::keystroke::KeystrokeKind;
use crate::stats::GameStatsSnapshot;

/// Frozen view of one game handed to subscribers on every state change
#[derive(Clone, Debug)]
pub struct GameStateUpdate {
    pub target_text: String,
    pub user_input: String,
    pub statistics: GameStatsSnapshot,
    pub is_over: bool,
}

/// Closed union of everything the engine can announce
#[derive(Clone, Debug)]
pub enum GameEvent {
    KeyPressed {
        character: char,
        kind: KeystrokeKind,
        position: usize,
    },
    BackspacePressed,
    StateUpdated(GameStateUpdate),
    GameEnded,
    GameQuit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyPressed,
    BackspacePressed,
    StateUpdated,
    GameEnded,
    GameQuit,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::KeyPressed { .. } => EventKind::KeyPressed,
            GameEvent::BackspacePressed => EventKind::BackspacePressed,
            GameEvent::StateUpdated(_) => EventKind::StateUpdated,
            GameEvent::GameEnded => EventKind::GameEnded,
            GameEvent::GameQuit => EventKind::GameQuit,
        }
    }
}

pub type Handler = Arc<dyn Fn(&GameEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Publish/subscribe channel decoupling the engine from its observers.
///
/// Handlers for a kind run in subscription order. Dispatch happens on a
/// snapshot of the handler list taken under the lock, so a handler may
/// subscribe or unsubscribe mid-publish without corrupting iteration; a
/// handler added during a publish does not see the in-flight event.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.lock().unwrap();
        handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut handlers = self.handlers.lock().unwrap();
        for entries in handlers.values_mut() {
            entries.retain(|(entry_id, _)| *entry_id != id);
        }
        handlers.retain(|_, entries| !entries.is_empty());
    }

    pub fn publish(&self, event: &GameEvent) {
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.lock().unwrap();
            match handlers.get(&event.kind()) {
                Some(entries) => entries.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        for handler in snapshot {
            handler(event);
        }
    }
}
