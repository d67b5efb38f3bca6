//! Connected sessions as seen by the ledger.
//!
//! The host decides who is online, which tags they carry and how messages
//! reach them. `LocalSessions` keeps all of that in memory and records every
//! message in an outbox.

use std::cell::RefCell;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub tags: BTreeSet<String>,
}

impl Session {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

pub trait SessionRegistry {
    /// Every currently connected session, in connection order.
    fn connected(&self) -> Vec<Session>;

    fn find(&self, name: &str) -> Option<Session> {
        self.connected().into_iter().find(|s| s.name == name)
    }

    fn send_message(&self, name: &str, message: &str);
}

#[derive(Debug, Default)]
pub struct LocalSessions {
    sessions: RefCell<Vec<Session>>,
    outbox:   RefCell<Vec<(String, String)>>,
}

impl LocalSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, name: &str) {
        let mut sessions = self.sessions.borrow_mut();
        if sessions.iter().any(|s| s.name == name) {
            return;
        }
        sessions.push(Session {
            name: name.to_string(),
            tags: BTreeSet::new(),
        });
    }

    pub fn disconnect(&self, name: &str) {
        self.sessions.borrow_mut().retain(|s| s.name != name);
    }

    pub fn add_tag(&self, name: &str, tag: &str) {
        if let Some(s) = self.sessions.borrow_mut().iter_mut().find(|s| s.name == name) {
            s.tags.insert(tag.to_string());
        }
    }

    pub fn remove_tag(&self, name: &str, tag: &str) {
        if let Some(s) = self.sessions.borrow_mut().iter_mut().find(|s| s.name == name) {
            s.tags.remove(tag);
        }
    }

    /// Messages delivered to `name` so far, oldest first.
    pub fn messages_for(&self, name: &str) -> Vec<String> {
        self.outbox
            .borrow()
            .iter()
            .filter(|(to, _)| to == name)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn clear_messages(&self) {
        self.outbox.borrow_mut().clear();
    }
}

impl SessionRegistry for LocalSessions {
    fn connected(&self) -> Vec<Session> {
        self.sessions.borrow().clone()
    }

    fn send_message(&self, name: &str, message: &str) {
        log::debug!("message -> {name}: {message}");
        self.outbox
            .borrow_mut()
            .push((name.to_string(), message.to_string()));
    }
}
