//! # Client Cache
//!
//! Eventually-consistent replica of the subscribed tables, keyed by primary
//! key. Rows are only ever changed by applying diffs that came from the
//! server; the client never writes here directly.

use std::collections::{BTreeMap, HashMap};

use rpg_shared::{Character, CharacterAppearance, CharacterId, Session, User};

use crate::events::{RowDiff, TableChange};

#[derive(Debug, Default, Clone)]
pub struct ClientCache {
    users: HashMap<String, User>,
    characters: BTreeMap<CharacterId, Character>,
    appearances: HashMap<CharacterId, CharacterAppearance>,
    sessions: HashMap<String, Session>,
}

fn apply_diff<K, T>(rows: &mut impl RowMap<K, T>, diff: &RowDiff<T>, key: impl Fn(&T) -> K)
where
    T: Clone,
{
    // Deletes first so a replace (delete + insert of the same key) keeps the new row.
    for row in &diff.deletes {
        rows.remove_key(&key(row));
    }
    for row in &diff.inserts {
        rows.insert_row(key(row), row.clone());
    }
}

trait RowMap<K, T> {
    fn remove_key(&mut self, key: &K);
    fn insert_row(&mut self, key: K, row: T);
}

impl<K: std::hash::Hash + Eq, T> RowMap<K, T> for HashMap<K, T> {
    fn remove_key(&mut self, key: &K) {
        self.remove(key);
    }
    fn insert_row(&mut self, key: K, row: T) {
        self.insert(key, row);
    }
}

impl<K: Ord, T> RowMap<K, T> for BTreeMap<K, T> {
    fn remove_key(&mut self, key: &K) {
        self.remove(key);
    }
    fn insert_row(&mut self, key: K, row: T) {
        self.insert(key, row);
    }
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, change: &TableChange) {
        match change {
            TableChange::User(diff) => apply_diff(&mut self.users, diff, |u| u.identity.clone()),
            TableChange::Character(diff) => apply_diff(&mut self.characters, diff, |c| c.id),
            TableChange::CharacterAppearance(diff) => {
                apply_diff(&mut self.appearances, diff, |a| a.character_id)
            }
            TableChange::Session(diff) => {
                apply_diff(&mut self.sessions, diff, |s| s.identity.clone())
            }
        }
    }

    pub fn clear(&mut self) {
        self.users.clear();
        self.characters.clear();
        self.appearances.clear();
        self.sessions.clear();
    }

    pub fn user(&self, identity: &str) -> Option<&User> {
        self.users.get(identity)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Characters owned by `identity`, in id order
    pub fn characters_owned_by(&self, identity: &str) -> Vec<Character> {
        self.characters
            .values()
            .filter(|c| c.is_owned_by(identity))
            .cloned()
            .collect()
    }

    pub fn character_named(&self, name: &str) -> Option<&Character> {
        self.characters.values().find(|c| c.name == name)
    }

    pub fn appearance(&self, character_id: CharacterId) -> Option<&CharacterAppearance> {
        self.appearances.get(&character_id)
    }

    pub fn session(&self, identity: &str) -> Option<&Session> {
        self.sessions.get(identity)
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }
}
