//! Operation counters
//!
//! Counting is off until [`init`] is called and stops again at [`teardown`]. The identifier
//! list and identifier map counters are separate groups, each guarded by a single mutex.
//! While counting is off, recording only reads a flag and never touches either mutex.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// Identifier list counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdlCounters {
    /// Identifiers appended, including those which widened a range
    pub appends: u64,
    /// Identifiers placed by ordered insert
    pub inserts: u64,
    /// Lists merged in
    pub merges: u64,
    /// Times storage grew
    pub grows: u64,
    /// Times storage shrank back to baseline
    pub shrinks: u64,
    /// Sorts performed
    pub sorts: u64,
    /// Lists collapsed into range form
    pub collapses: u64,
}

/// Identifier map counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Id2lCounters {
    /// Successful inserts
    pub inserts: u64,
    /// Inserts rejected as duplicates
    pub duplicates: u64,
    /// Inserts rejected because the map was full
    pub full: u64,
}

/// A copy of both counter groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Identifier list counters
    pub idl: IdlCounters,
    /// Identifier map counters
    pub id2l: Id2lCounters,
}

static ENABLED: AtomicBool = AtomicBool::new(false);
static IDL: Mutex<Option<IdlCounters>> = Mutex::new(None);
static ID2L: Mutex<Option<Id2lCounters>> = Mutex::new(None);

fn lock<T>(group: &Mutex<T>) -> MutexGuard<'_, T> {
    // Counters are plain integers, a panic elsewhere can't leave them inconsistent
    group.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start counting from zero.
///
/// Calling `init` while counting is already enabled resets the counters.
pub fn init() {
    *lock(&IDL) = Some(IdlCounters::default());
    *lock(&ID2L) = Some(Id2lCounters::default());
    ENABLED.store(true, Ordering::Release);
    tracing::debug!("operation counters enabled");
}

/// Stop counting and return the final counter values, if counting was enabled.
pub fn teardown() -> Option<Snapshot> {
    ENABLED.store(false, Ordering::Release);
    let idl = lock(&IDL).take();
    let id2l = lock(&ID2L).take();
    tracing::debug!("operation counters disabled");
    Some(Snapshot {
        idl: idl?,
        id2l: id2l?,
    })
}

/// Return the current counter values, if counting is enabled.
pub fn snapshot() -> Option<Snapshot> {
    let idl = *lock(&IDL);
    let id2l = *lock(&ID2L);
    Some(Snapshot {
        idl: idl?,
        id2l: id2l?,
    })
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Acquire)
}

pub(crate) fn record_idl(f: impl FnOnce(&mut IdlCounters)) {
    if !enabled() {
        return;
    }
    if let Some(counters) = lock(&IDL).as_mut() {
        f(counters);
    }
}

pub(crate) fn record_id2l(f: impl FnOnce(&mut Id2lCounters)) {
    if !enabled() {
        return;
    }
    if let Some(counters) = lock(&ID2L).as_mut() {
        f(counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use crate::idl::IdlConfig;
    use crate::{Id2l, Idl};

    fn appended_elsewhere() -> mpsc::Receiver<usize> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut idl = Idl::with_config(IdlConfig::new(2, 16).expect("valid config"))
                .expect("allocates");
            idl.append_list(&[3, 1, 2]).expect("appends");
            idl.sort();
            let mut map = Id2l::new();
            map.insert(7, ()).expect("inserts");
            let _ = tx.send(idl.len() + map.len());
        });
        rx
    }

    // Counters are process wide and other tests run concurrently, so only lower bounds are
    // checked and only this test enables counting.
    #[test_log::test]
    fn it_counts_operations_between_init_and_teardown() {
        // While counting is off, holding both counter locks must not stall unrelated lists
        {
            let _idl = lock(&IDL);
            let _id2l = lock(&ID2L);
            let done = appended_elsewhere().recv_timeout(Duration::from_secs(5));
            assert_eq!(done, Ok(4));
        }

        init();
        assert!(snapshot().is_some());

        let config = IdlConfig::new(4, 16).expect("valid config");
        let mut idl = Idl::with_config(config).expect("allocates");
        for id in 0..10 {
            idl.append(id).expect("appends");
        }
        idl.sort();
        assert!(idl.shrink());

        // Every path which adds identifiers is counted
        let mut ordered = Idl::with_config(IdlConfig::new(4, 3).expect("valid config"))
            .expect("allocates");
        ordered.insert(10).expect("inserts");
        ordered.insert(20).expect("inserts");
        ordered.insert(30).expect("collapses");
        ordered.append(5).expect("widens");
        ordered.append_list(&[1, 40]).expect("widens");
        let mut other = Idl::with_config(config).expect("allocates");
        other.append(2).expect("appends");
        idl.merge(&other).expect("merges");

        let mut map = Id2l::with_max(1).expect("valid max");
        map.insert(1, ()).expect("inserts");
        assert!(map.insert(1, ()).is_err());
        assert!(map.insert(2, ()).is_err());

        let counted = snapshot().expect("counting enabled");
        assert!(counted.idl.appends >= 14);
        assert!(counted.idl.inserts >= 3);
        assert!(counted.idl.merges >= 1);
        assert!(counted.idl.grows >= 2);
        assert!(counted.idl.sorts >= 1);
        assert!(counted.idl.shrinks >= 1);
        assert!(counted.idl.collapses >= 1);
        assert!(counted.id2l.inserts >= 1);
        assert!(counted.id2l.duplicates >= 1);
        assert!(counted.id2l.full >= 1);

        let last = teardown().expect("counting was enabled");
        assert!(last.idl.appends >= counted.idl.appends);
        assert!(snapshot().is_none());
        assert!(teardown().is_none());

        // Disabled again
        record_id2l(|c| c.inserts += 1);
        assert!(snapshot().is_none());
        let _idl = lock(&IDL);
        let done = appended_elsewhere().recv_timeout(Duration::from_secs(5));
        assert_eq!(done, Ok(4));
    }
}
