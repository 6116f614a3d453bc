//! Client-side query cache with snapshot/rollback for optimistic writes.
//!
//! Entries are keyed by the query that produced them. A write cancels
//! in-flight fetches for the keys it touches, snapshots them, patches them in
//! place, and on failure restores the snapshot verbatim. Afterwards the keys
//! are marked stale and refetched from the store, which is the only source of
//! truth.

use std::collections::HashMap;

use db::models::task::{Task, TaskStats, TaskStatus};
use uuid::Uuid;

use crate::store::{StoreError, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// A profile's tasks, optionally limited to one status.
    TaskList {
        profile_id: Uuid,
        status: Option<TaskStatus>,
    },
    Task(Uuid),
    ProfileStats(Uuid),
}

impl QueryKey {
    pub fn task_list(profile_id: Uuid, status: Option<TaskStatus>) -> Self {
        QueryKey::TaskList { profile_id, status }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Tasks(Vec<Task>),
    Task(Task),
    Stats(TaskStats),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: CachedData,
    pub stale: bool,
}

/// Which keys an operation touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    All,
    /// Every list and stats entry of the profile plus the named task entries.
    Profile {
        profile_id: Uuid,
        task_ids: Vec<Uuid>,
    },
}

impl QueryScope {
    pub fn profile(profile_id: Uuid) -> Self {
        QueryScope::Profile {
            profile_id,
            task_ids: Vec::new(),
        }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            QueryScope::All => true,
            QueryScope::Profile {
                profile_id,
                task_ids,
            } => match key {
                QueryKey::TaskList { profile_id: p, .. } | QueryKey::ProfileStats(p) => {
                    p == profile_id
                }
                QueryKey::Task(id) => task_ids.contains(id),
            },
        }
    }
}

/// Proof that a fetch started at a given generation of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> QueryKey {
        self.key
    }
}

/// Copy of every in-scope entry at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    scope: QueryScope,
    entries: Vec<(QueryKey, CacheEntry)>,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
    generations: HashMap<QueryKey, u64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<&CachedData> {
        self.entries.get(key).map(|entry| &entry.data)
    }

    pub fn entry(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn tasks(&self, key: &QueryKey) -> Option<&[Task]> {
        match self.get(key) {
            Some(CachedData::Tasks(tasks)) => Some(tasks),
            _ => None,
        }
    }

    pub fn set(&mut self, key: QueryKey, data: CachedData) {
        self.entries.insert(key, CacheEntry { data, stale: false });
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.stale)
    }

    /// Looks for the task in any cached entry.
    pub fn find_task(&self, id: Uuid) -> Option<&Task> {
        if let Some(CachedData::Task(task)) = self.get(&QueryKey::Task(id)) {
            return Some(task);
        }
        self.entries.values().find_map(|entry| match &entry.data {
            CachedData::Tasks(tasks) => tasks.iter().find(|task| task.id == id),
            _ => None,
        })
    }

    /// Scope covering the task's profile, or everything when the task is not cached.
    pub fn scope_for_tasks(&self, ids: &[Uuid]) -> QueryScope {
        match ids.iter().find_map(|id| self.find_task(*id)) {
            Some(task) => QueryScope::Profile {
                profile_id: task.profile_id,
                task_ids: ids.to_vec(),
            },
            None => QueryScope::All,
        }
    }

    pub fn begin_fetch(&mut self, key: QueryKey) -> FetchTicket {
        let generation = *self.generations.entry(key).or_insert(0);
        FetchTicket { key, generation }
    }

    /// Stores the fetched data unless the key was cancelled since the ticket
    /// was issued. Returns whether the data was kept.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, data: CachedData) -> bool {
        let current = self.generations.get(&ticket.key).copied().unwrap_or(0);
        if current != ticket.generation {
            tracing::debug!(key = ?ticket.key, "discarding superseded fetch result");
            return false;
        }
        self.set(ticket.key, data);
        true
    }

    /// Invalidates every outstanding ticket for keys in scope.
    pub fn cancel(&mut self, scope: &QueryScope) {
        let keys: Vec<QueryKey> = self
            .generations
            .keys()
            .chain(self.entries.keys())
            .filter(|key| scope.matches(key))
            .copied()
            .collect();
        for key in keys {
            *self.generations.entry(key).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self, scope: &QueryScope) -> Snapshot {
        Snapshot {
            scope: scope.clone(),
            entries: self
                .entries
                .iter()
                .filter(|(key, _)| scope.matches(key))
                .map(|(key, entry)| (*key, entry.clone()))
                .collect(),
        }
    }

    /// Restores the scope to exactly what the snapshot held, dropping any
    /// entry created after it.
    pub fn rollback(&mut self, snapshot: Snapshot) {
        self.entries.retain(|key, _| !snapshot.scope.matches(key));
        self.entries.extend(snapshot.entries);
    }

    pub fn patch_task_lists<F>(&mut self, scope: &QueryScope, mut f: F)
    where
        F: FnMut(&QueryKey, &mut Vec<Task>),
    {
        for (key, entry) in self.entries.iter_mut() {
            if !scope.matches(key) {
                continue;
            }
            if let CachedData::Tasks(tasks) = &mut entry.data {
                f(key, tasks);
            }
        }
    }

    pub fn patch_task<F>(&mut self, id: Uuid, f: F)
    where
        F: FnOnce(&mut Task),
    {
        if let Some(CacheEntry {
            data: CachedData::Task(task),
            ..
        }) = self.entries.get_mut(&QueryKey::Task(id))
        {
            f(task);
        }
    }

    pub fn remove(&mut self, key: &QueryKey) {
        self.entries.remove(key);
    }

    pub fn invalidate(&mut self, scope: &QueryScope) {
        for (key, entry) in self.entries.iter_mut() {
            if scope.matches(key) {
                entry.stale = true;
            }
        }
    }

    /// Fetches `key` from the store and caches the result.
    pub async fn fetch<S>(&mut self, store: &S, key: QueryKey) -> Result<&CachedData, StoreError>
    where
        S: TaskStore + ?Sized,
    {
        let ticket = self.begin_fetch(key);
        let data = load(store, key).await?;
        self.complete_fetch(ticket, data);
        self.get(&key)
            .ok_or_else(|| StoreError::NotFound("Query was cancelled".to_string()))
    }

    /// Reloads every stale entry. Failures are logged and leave the entry stale.
    pub async fn refetch_stale<S>(&mut self, store: &S) -> usize
    where
        S: TaskStore + ?Sized,
    {
        let stale: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| *key)
            .collect();

        let mut refreshed = 0;
        for key in stale {
            let ticket = self.begin_fetch(key);
            match load(store, key).await {
                Ok(data) => {
                    if self.complete_fetch(ticket, data) {
                        refreshed += 1;
                    }
                }
                Err(StoreError::NotFound(_)) if matches!(key, QueryKey::Task(_)) => {
                    self.entries.remove(&key);
                }
                Err(err) => {
                    tracing::warn!(key = ?key, error = %err, "failed to refetch cached query");
                }
            }
        }
        refreshed
    }
}

async fn load<S>(store: &S, key: QueryKey) -> Result<CachedData, StoreError>
where
    S: TaskStore + ?Sized,
{
    Ok(match key {
        QueryKey::TaskList { profile_id, status } => {
            CachedData::Tasks(store.list_tasks_by_partition(profile_id, status).await?)
        }
        QueryKey::Task(id) => CachedData::Task(store.get_task(id).await?),
        QueryKey::ProfileStats(profile_id) => {
            CachedData::Stats(store.task_stats(profile_id).await?)
        }
    })
}

/// Manual order: sort order, then creation time, then id.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}
