//! Transaction-scoped multi-document store.
//!
//! Entities live in typed collections keyed by id. `Store::begin` opens a
//! write transaction: reads see committed state plus the transaction's own
//! staged writes, `Tx::commit` applies the staged writes in one step, and
//! dropping a `Tx` without committing discards them (abort). A single-writer
//! lock is the whole concurrency model: guard checks and writes inside one
//! transaction are never interleaved with another writer. Pure read paths use
//! `Store::read`, which shares the lock instead of excluding writers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::models::{Comment, Project, Task, User, Verification, Workspace, WorkspaceInvite};

#[derive(Debug, Default)]
pub struct Dataset {
    users: HashMap<Uuid, User>,
    verifications: HashMap<Uuid, Verification>,
    workspaces: HashMap<Uuid, Workspace>,
    invites: HashMap<Uuid, WorkspaceInvite>,
    projects: HashMap<Uuid, Project>,
    tasks: HashMap<Uuid, Task>,
    comments: HashMap<Uuid, Comment>,
}

/// Cloneable handle to the shared dataset.
#[derive(Clone, Default)]
pub struct Store {
    data: Arc<RwLock<Dataset>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a write transaction. Holds the writer slot until commit or drop.
    pub async fn begin(&self) -> Tx {
        Tx {
            base: self.data.clone().write_owned().await,
            staged: Staged::default(),
        }
    }

    /// Shared read-only snapshot for pure read paths.
    pub async fn read(&self) -> Snapshot {
        Snapshot {
            guard: self.data.clone().read_owned().await,
        }
    }
}

/// Per-collection staged writes: `Some(doc)` is an upsert, `None` a delete.
#[derive(Default)]
struct Staged {
    users: HashMap<Uuid, Option<User>>,
    verifications: HashMap<Uuid, Option<Verification>>,
    workspaces: HashMap<Uuid, Option<Workspace>>,
    invites: HashMap<Uuid, Option<WorkspaceInvite>>,
    projects: HashMap<Uuid, Option<Project>>,
    tasks: HashMap<Uuid, Option<Task>>,
    comments: HashMap<Uuid, Option<Comment>>,
}

impl Staged {
    fn apply(self, base: &mut Dataset) {
        fn merge<T>(target: &mut HashMap<Uuid, T>, overlay: HashMap<Uuid, Option<T>>) {
            for (id, op) in overlay {
                match op {
                    Some(doc) => {
                        target.insert(id, doc);
                    }
                    None => {
                        target.remove(&id);
                    }
                }
            }
        }
        merge(&mut base.users, self.users);
        merge(&mut base.verifications, self.verifications);
        merge(&mut base.workspaces, self.workspaces);
        merge(&mut base.invites, self.invites);
        merge(&mut base.projects, self.projects);
        merge(&mut base.tasks, self.tasks);
        merge(&mut base.comments, self.comments);
    }
}

/// An open write transaction. Dropping without `commit` aborts it.
pub struct Tx {
    base: OwnedRwLockWriteGuard<Dataset>,
    staged: Staged,
}

impl Tx {
    pub fn users(&mut self) -> Docs<'_, User> {
        Docs { base: &self.base.users, overlay: &mut self.staged.users }
    }

    pub fn verifications(&mut self) -> Docs<'_, Verification> {
        Docs { base: &self.base.verifications, overlay: &mut self.staged.verifications }
    }

    pub fn workspaces(&mut self) -> Docs<'_, Workspace> {
        Docs { base: &self.base.workspaces, overlay: &mut self.staged.workspaces }
    }

    pub fn invites(&mut self) -> Docs<'_, WorkspaceInvite> {
        Docs { base: &self.base.invites, overlay: &mut self.staged.invites }
    }

    pub fn projects(&mut self) -> Docs<'_, Project> {
        Docs { base: &self.base.projects, overlay: &mut self.staged.projects }
    }

    pub fn tasks(&mut self) -> Docs<'_, Task> {
        Docs { base: &self.base.tasks, overlay: &mut self.staged.tasks }
    }

    pub fn comments(&mut self) -> Docs<'_, Comment> {
        Docs { base: &self.base.comments, overlay: &mut self.staged.comments }
    }

    /// Apply all staged writes atomically.
    pub fn commit(self) {
        let Tx { mut base, staged } = self;
        staged.apply(&mut base);
    }

    /// Discard staged writes. Equivalent to dropping the transaction; spelled
    /// out for call sites that abort on purpose rather than by error.
    pub fn abort(self) {}
}

/// Transactional view of one collection: committed documents overlaid with
/// this transaction's writes.
pub struct Docs<'a, T> {
    base: &'a HashMap<Uuid, T>,
    overlay: &'a mut HashMap<Uuid, Option<T>>,
}

impl<T: Clone> Docs<'_, T> {
    pub fn get(&self, id: Uuid) -> Option<T> {
        match self.overlay.get(&id) {
            Some(Some(doc)) => Some(doc.clone()),
            Some(None) => None,
            None => self.base.get(&id).cloned(),
        }
    }

    pub fn put(&mut self, id: Uuid, doc: T) {
        self.overlay.insert(id, Some(doc));
    }

    pub fn delete(&mut self, id: Uuid) {
        self.overlay.insert(id, None);
    }

    /// First document matching the predicate. Iteration order is unspecified;
    /// callers needing order sort the results of `filter` instead.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.iter().find(|doc| pred(doc)).cloned()
    }

    pub fn filter(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        self.iter().filter(|doc| pred(doc)).cloned().collect()
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.base
            .iter()
            .filter(|(id, _)| !self.overlay.contains_key(*id))
            .map(|(_, doc)| doc)
            .chain(self.overlay.values().filter_map(|op| op.as_ref()))
    }
}

/// Committed-state snapshot shared with concurrent readers.
pub struct Snapshot {
    guard: OwnedRwLockReadGuard<Dataset>,
}

impl Snapshot {
    pub fn users(&self) -> View<'_, User> {
        View { base: &self.guard.users }
    }

    pub fn workspaces(&self) -> View<'_, Workspace> {
        View { base: &self.guard.workspaces }
    }

    pub fn projects(&self) -> View<'_, Project> {
        View { base: &self.guard.projects }
    }

    pub fn tasks(&self) -> View<'_, Task> {
        View { base: &self.guard.tasks }
    }

    pub fn comments(&self) -> View<'_, Comment> {
        View { base: &self.guard.comments }
    }
}

/// Read-only view of one collection.
pub struct View<'a, T> {
    base: &'a HashMap<Uuid, T>,
}

impl<T: Clone> View<'_, T> {
    pub fn get(&self, id: Uuid) -> Option<T> {
        self.base.get(&id).cloned()
    }

    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.base.values().find(|doc| pred(doc)).cloned()
    }

    pub fn filter(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        self.base.values().filter(|doc| pred(doc)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use time::OffsetDateTime;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "hash".into(),
            name: "Test".into(),
            email_verified: false,
            last_login: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_transactions() {
        let store = Store::new();
        let alice = user("alice@example.com");
        let id = alice.id;

        let mut tx = store.begin().await;
        tx.users().put(id, alice);
        tx.commit();

        let mut tx = store.begin().await;
        assert_eq!(tx.users().get(id).unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn dropped_transaction_discards_staged_writes() {
        let store = Store::new();
        let bob = user("bob@example.com");
        let id = bob.id;

        {
            let mut tx = store.begin().await;
            tx.users().put(id, bob);
            // no commit
        }

        let snapshot = store.read().await;
        assert!(snapshot.users().get(id).is_none());
    }

    #[tokio::test]
    async fn explicit_abort_discards_staged_writes() {
        let store = Store::new();
        let carol = user("carol@example.com");
        let id = carol.id;

        let mut tx = store.begin().await;
        tx.users().put(id, carol);
        tx.abort();

        let snapshot = store.read().await;
        assert!(snapshot.users().get(id).is_none());
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = Store::new();
        let dave = user("dave@example.com");
        let id = dave.id;

        let mut tx = store.begin().await;
        tx.users().put(id, dave);
        assert!(tx.users().get(id).is_some());
        assert!(tx.users().find(|u| u.email == "dave@example.com").is_some());
    }

    #[tokio::test]
    async fn staged_delete_hides_committed_document() {
        let store = Store::new();
        let erin = user("erin@example.com");
        let id = erin.id;

        let mut tx = store.begin().await;
        tx.users().put(id, erin);
        tx.commit();

        let mut tx = store.begin().await;
        tx.users().delete(id);
        assert!(tx.users().get(id).is_none());
        assert!(tx.users().filter(|_| true).is_empty());
        tx.commit();

        let snapshot = store.read().await;
        assert!(snapshot.users().get(id).is_none());
    }

    #[tokio::test]
    async fn filter_sees_staged_updates_not_stale_committed_state() {
        let store = Store::new();
        let mut frank = user("frank@example.com");
        let id = frank.id;

        let mut tx = store.begin().await;
        tx.users().put(id, frank.clone());
        tx.commit();

        let mut tx = store.begin().await;
        frank.email_verified = true;
        tx.users().put(id, frank);
        let verified = tx.users().filter(|u| u.email_verified);
        assert_eq!(verified.len(), 1);
        let unverified = tx.users().filter(|u| !u.email_verified);
        assert!(unverified.is_empty());
    }
}
