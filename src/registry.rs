//! File-backed group registry and id counter.
//!
//! One line per group, `MP-<n>_=_MP-<n>:_<K>_:<m1>:<m2>:...:<mK>`. The line
//! format is a compatibility boundary: in memory everything is a
//! [`GroupRecord`]. Mutation means read all, rewrite all to a temp file,
//! atomically rename into place. The counter lives in its own file holding
//! the next id to allocate; a missing counter auto-heals to a fresh
//! sequence, an unreadable one is a hard error.
//!
//! All entry points serialize on an internal mutex. Writers in other
//! processes are NOT protected against — callers own that discipline.

use std::fs;
use std::io;
use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::error::MultipathError;
use crate::gri::{GroupId, ReservationId, natural_cmp};
use crate::model::GroupRecord;
use crate::observability;

const LOOKUP_FILE: &str = "mp_gri_lookup.txt";
const COUNTER_FILE: &str = "mp_gri_tracker.txt";

impl GroupRecord {
    /// Serialize to the persisted line encoding. Zero members encode with an
    /// empty tail (`MP-3_=_MP-3:_0_:`).
    pub fn encode_line(&self) -> String {
        let mut line = format!("{id}_=_{id}:_{k}_:", id = self.id, k = self.members.len());
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                line.push(':');
            }
            line.push_str(&member.to_string());
        }
        line
    }

    /// Parse one registry line. The stored K must match the member count;
    /// anything malformed is an error, never a guess.
    pub fn parse_line(line: &str) -> Result<GroupRecord, MultipathError> {
        let malformed = |what: &str| MultipathError::Registry(format!("malformed registry line ({what}): {line}"));

        let (short, long) = line.split_once("_=_").ok_or_else(|| malformed("missing _=_"))?;
        let id = ReservationId::parse(short)
            .as_group()
            .ok_or_else(|| malformed("key is not a group id"))?;
        let tail = long
            .strip_prefix(short)
            .and_then(|t| t.strip_prefix(":_"))
            .ok_or_else(|| malformed("long form does not repeat the key"))?;
        let (count, member_tail) = tail.split_once("_:").ok_or_else(|| malformed("missing member count"))?;
        let k: usize = count
            .parse()
            .map_err(|_| malformed("member count is not a number"))?;

        let members: Vec<ReservationId> = member_tail
            .split(':')
            .filter(|t| !t.is_empty())
            .map(ReservationId::parse)
            .collect();
        if members.len() != k {
            return Err(malformed("member count does not match member list"));
        }

        Ok(GroupRecord { id, members })
    }
}

/// Member tokens are colon-delimited on disk, so a colon inside one would
/// corrupt the line.
fn check_member_tokens(record: &GroupRecord) -> Result<(), MultipathError> {
    for member in &record.members {
        let token = member.to_string();
        if token.is_empty() || token.contains(':') || token.contains("_=_") {
            return Err(MultipathError::Registry(format!(
                "member id not representable in registry encoding: {token:?}"
            )));
        }
    }
    Ok(())
}

pub struct GroupRegistry {
    lookup_path: PathBuf,
    counter_path: PathBuf,
    lock: Mutex<()>,
}

impl GroupRegistry {
    /// Registry rooted in `data_dir`, using the standard file names.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let dir = data_dir.into();
        Self::with_paths(dir.join(LOOKUP_FILE), dir.join(COUNTER_FILE))
    }

    pub fn with_paths(lookup_path: PathBuf, counter_path: PathBuf) -> Self {
        Self {
            lookup_path,
            counter_path,
            lock: Mutex::new(()),
        }
    }

    /// Allocate the next group id and persist the follow-up value. The
    /// counter advances regardless of whether the group is ever persisted.
    pub async fn allocate(&self) -> Result<GroupId, MultipathError> {
        let _guard = self.lock.lock().await;
        let current = match fs::read_to_string(&self.counter_path) {
            Ok(text) => text.trim().parse::<u64>().map_err(|_| {
                MultipathError::Registry(format!(
                    "counter file {} is unreadable: {text:?}",
                    self.counter_path.display()
                ))
            })?,
            // Missing counter auto-heals: start a fresh sequence at 0.
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(registry_io("reading counter", e)),
        };
        fs::write(&self.counter_path, format!("{}\n", current + 1))
            .map_err(|e| registry_io("writing counter", e))?;
        tracing::debug!(id = current, "allocated group id");
        Ok(GroupId(current))
    }

    pub async fn get(&self, id: GroupId) -> Result<Option<GroupRecord>, MultipathError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_records()?.into_iter().find(|r| r.id == id))
    }

    /// Replace the matching line, or append if the group is new.
    pub async fn upsert(&self, record: &GroupRecord) -> Result<(), MultipathError> {
        check_member_tokens(record)?;
        let _guard = self.lock.lock().await;
        let mut records = self.read_records()?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.write_records(&records)
    }

    /// Reinitialize the registry to contain exactly this record. Used when
    /// id 0 is allocated, so entries from before a counter reset cannot
    /// collide with the new sequence.
    pub async fn reset_with(&self, record: &GroupRecord) -> Result<(), MultipathError> {
        check_member_tokens(record)?;
        let _guard = self.lock.lock().await;
        tracing::warn!(id = %record.id, "reinitializing group registry");
        self.write_records(std::slice::from_ref(record))
    }

    /// Delete a group's line. Returns false if the group was not present.
    pub async fn remove(&self, id: GroupId) -> Result<bool, MultipathError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_records(&records)?;
        Ok(true)
    }

    /// Find the group a reservation belongs to, if any. First match wins;
    /// an id is not expected to appear in more than one group.
    pub async fn member_of(&self, member: &ReservationId) -> Result<Option<GroupRecord>, MultipathError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_records()?
            .into_iter()
            .find(|r| r.members.contains(member)))
    }

    /// All groups, in natural display order.
    pub async fn list(&self) -> Result<Vec<GroupRecord>, MultipathError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records()?;
        records.sort_by(|a, b| natural_cmp(&a.id.to_string(), &b.id.to_string()));
        Ok(records)
    }

    fn read_records(&self) -> Result<Vec<GroupRecord>, MultipathError> {
        let text = match fs::read_to_string(&self.lookup_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(registry_io("reading lookup table", e)),
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(GroupRecord::parse_line)
            .collect()
    }

    /// Write the full table to a temp file, fsync, then rename over the
    /// lookup file so a crash never leaves a half-written table.
    fn write_records(&self, records: &[GroupRecord]) -> Result<(), MultipathError> {
        let tmp_path = self.lookup_path.with_extension("txt.tmp");
        let mut text = String::new();
        for record in records {
            text.push_str(&record.encode_line());
            text.push('\n');
        }
        fs::write(&tmp_path, &text).map_err(|e| registry_io("writing lookup table", e))?;
        let file = fs::File::open(&tmp_path).map_err(|e| registry_io("reopening lookup table", e))?;
        file.sync_all().map_err(|e| registry_io("syncing lookup table", e))?;
        fs::rename(&tmp_path, &self.lookup_path).map_err(|e| registry_io("swapping lookup table", e))?;
        metrics::counter!(observability::REGISTRY_REWRITES_TOTAL).increment(1);
        Ok(())
    }
}

fn registry_io(what: &str, e: io::Error) -> MultipathError {
    MultipathError::Registry(format!("{what}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gri::UnicastId;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("braid_test_registry").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn unicast(s: &str) -> ReservationId {
        ReservationId::Unicast(UnicastId(s.into()))
    }

    fn record(id: u64, members: &[&str]) -> GroupRecord {
        GroupRecord {
            id: GroupId(id),
            members: members.iter().map(|m| ReservationId::parse(m)).collect(),
        }
    }

    // ── Line codec ───────────────────────────────────────────

    #[test]
    fn encode_line_format() {
        let r = record(3, &["es.net-41", "es.net-42"]);
        assert_eq!(r.encode_line(), "MP-3_=_MP-3:_2_:es.net-41:es.net-42");
    }

    #[test]
    fn encode_empty_group() {
        let r = record(5, &[]);
        assert_eq!(r.encode_line(), "MP-5_=_MP-5:_0_:");
    }

    #[test]
    fn line_round_trip() {
        let r = record(7, &["es.net-1", "es.net-2", "es.net-3"]);
        let line = r.encode_line();
        let parsed = GroupRecord::parse_line(&line).unwrap();
        assert_eq!(parsed, r);
        assert_eq!(parsed.encode_line(), line);
    }

    #[test]
    fn nested_group_member_round_trips() {
        let r = GroupRecord {
            id: GroupId(9),
            members: vec![unicast("es.net-1"), ReservationId::Group(GroupId(2))],
        };
        let parsed = GroupRecord::parse_line(&r.encode_line()).unwrap();
        assert_eq!(parsed, r);
        assert_eq!(parsed.members[1], ReservationId::Group(GroupId(2)));
    }

    #[test]
    fn parse_rejects_count_mismatch() {
        let err = GroupRecord::parse_line("MP-3_=_MP-3:_3_:es.net-41:es.net-42");
        assert!(matches!(err, Err(MultipathError::Registry(_))));
    }

    #[test]
    fn parse_rejects_garbage() {
        for line in [
            "not a line",
            "MP-3_=_MP-4:_0_:",
            "es.net-1_=_es.net-1:_0_:",
            "MP-3_=_MP-3:_x_:es.net-1",
        ] {
            assert!(GroupRecord::parse_line(line).is_err(), "{line}");
        }
    }

    #[test]
    fn member_with_colon_is_rejected() {
        let r = GroupRecord {
            id: GroupId(1),
            members: vec![unicast("bad:token")],
        };
        assert!(check_member_tokens(&r).is_err());
    }

    // ── Counter ──────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_counter_starts_at_zero() {
        let registry = GroupRegistry::new(test_dir("fresh_counter"));
        assert_eq!(registry.allocate().await.unwrap(), GroupId(0));
        assert_eq!(registry.allocate().await.unwrap(), GroupId(1));
    }

    #[tokio::test]
    async fn counter_survives_restart() {
        let dir = test_dir("counter_restart");
        {
            let registry = GroupRegistry::new(dir.clone());
            assert_eq!(registry.allocate().await.unwrap(), GroupId(0));
            assert_eq!(registry.allocate().await.unwrap(), GroupId(1));
        }
        // Simulated restart: a new registry over the same files continues
        let registry = GroupRegistry::new(dir);
        assert_eq!(registry.allocate().await.unwrap(), GroupId(2));
    }

    #[tokio::test]
    async fn unreadable_counter_is_hard_error() {
        let dir = test_dir("bad_counter");
        fs::write(dir.join(COUNTER_FILE), "not-a-number\n").unwrap();
        let registry = GroupRegistry::new(dir);
        assert!(matches!(
            registry.allocate().await,
            Err(MultipathError::Registry(_))
        ));
    }

    // ── Table mutation ───────────────────────────────────────

    #[tokio::test]
    async fn upsert_appends_then_replaces() {
        let registry = GroupRegistry::new(test_dir("upsert"));
        registry.upsert(&record(0, &["a-1"])).await.unwrap();
        registry.upsert(&record(1, &["b-1", "b-2"])).await.unwrap();

        let grown = record(0, &["a-1", "a-2"]);
        registry.upsert(&grown).await.unwrap();

        assert_eq!(registry.get(GroupId(0)).await.unwrap(), Some(grown));
        assert_eq!(registry.get(GroupId(1)).await.unwrap(), Some(record(1, &["b-1", "b-2"])));
        assert_eq!(registry.get(GroupId(9)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_deletes_line() {
        let registry = GroupRegistry::new(test_dir("remove"));
        registry.upsert(&record(0, &["a-1"])).await.unwrap();
        registry.upsert(&record(1, &["b-1"])).await.unwrap();

        assert!(registry.remove(GroupId(0)).await.unwrap());
        assert!(!registry.remove(GroupId(0)).await.unwrap());
        assert_eq!(registry.get(GroupId(0)).await.unwrap(), None);
        assert!(registry.get(GroupId(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn member_of_scans_groups() {
        let registry = GroupRegistry::new(test_dir("member_of"));
        registry.upsert(&record(0, &["a-1", "a-2"])).await.unwrap();
        registry.upsert(&record(1, &["b-1"])).await.unwrap();

        let found = registry.member_of(&unicast("a-2")).await.unwrap().unwrap();
        assert_eq!(found.id, GroupId(0));
        assert!(registry.member_of(&unicast("zz-9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_sorted_naturally() {
        let registry = GroupRegistry::new(test_dir("list_order"));
        for id in [10, 2, 1, 11, 9] {
            registry.upsert(&record(id, &["x-1"])).await.unwrap();
        }
        let ids: Vec<u64> = registry.list().await.unwrap().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 9, 10, 11]);
    }

    #[tokio::test]
    async fn reset_with_truncates_stale_entries() {
        let registry = GroupRegistry::new(test_dir("reset"));
        registry.upsert(&record(4, &["old-1"])).await.unwrap();
        registry.upsert(&record(5, &["old-2"])).await.unwrap();

        registry.reset_with(&record(0, &["new-1"])).await.unwrap();

        let records = registry.list().await.unwrap();
        assert_eq!(records, vec![record(0, &["new-1"])]);
    }

    #[tokio::test]
    async fn corrupt_line_aborts_mutation_and_preserves_file() {
        let dir = test_dir("corrupt");
        let registry = GroupRegistry::new(dir.clone());
        registry.upsert(&record(0, &["a-1"])).await.unwrap();

        // Corrupt the table behind the registry's back
        let path = dir.join(LOOKUP_FILE);
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("garbage line\n");
        fs::write(&path, &text).unwrap();

        assert!(matches!(
            registry.upsert(&record(1, &["b-1"])).await,
            Err(MultipathError::Registry(_))
        ));
        // The file was not rewritten
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }
}
