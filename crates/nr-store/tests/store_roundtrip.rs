use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use nr_core::{CollabError, EntityId, Revision, point};
use nr_graph::{Entity, Pipe, Structure};
use nr_rules::{Finding, FindingKey, FindingKind, FindingStatus};
use nr_store::{
    AuditOperation, AuditOutcome, AuditRecord, AuditSink, FileStore, MemoryStore,
    StoreCollaborator, SyncRecord,
};
use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn sample_entities() -> (Entity, Entity, Entity) {
    let s1 = Structure::new("S1", point(0.0, 0.0, 0.0)).with_label("MH-1");
    let s2 = Structure::new("S2", point(10.0, 0.0, -2.0));
    let p1 = Pipe::between("P1", &s1, &s2);
    (s1.into(), s2.into(), p1.into())
}

#[test]
fn pushed_entities_load_back_unchanged() {
    let dir = unique_temp_dir("nr_store_roundtrip");
    let store = FileStore::new(dir.clone()).expect("failed to open store");
    let (s1, s2, p1) = sample_entities();

    store
        .upsert_entities(&[s1.clone(), s2.clone(), p1.clone()])
        .expect("failed to upsert entities");
    let records: Vec<_> = [&s1, &s2, &p1]
        .iter()
        .map(|e| SyncRecord::in_sync(e, e.revision(), e.revision()))
        .collect();
    store
        .upsert_sync_records(&records)
        .expect("failed to upsert sync records");

    let loaded = store.load_entities().expect("failed to load entities");
    assert_eq!(loaded.len(), 3);
    assert!(loaded.contains(&p1));

    let state = store.load_sync_state().expect("failed to load sync state");
    let p1_record = state
        .iter()
        .find(|r| r.entity_id.as_str() == "P1")
        .expect("missing P1 record");
    assert_eq!(p1_record.base.as_ref(), Some(&p1));
    assert_eq!(p1_record.last_store, Revision::new(1));

    fs::remove_dir_all(dir).ok();
}

#[test]
fn upsert_replaces_by_id() {
    let dir = unique_temp_dir("nr_store_upsert");
    let store = FileStore::new(dir.clone()).expect("failed to open store");
    let (s1, _, _) = sample_entities();

    store.upsert_entities(&[s1.clone()]).unwrap();
    store
        .upsert_entities(&[s1.clone().with_revision(Revision::new(5))])
        .unwrap();

    let loaded = store.load_entities().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].revision(), Revision::new(5));

    fs::remove_dir_all(dir).ok();
}

#[test]
fn corrections_show_up_as_pending() {
    let dir = unique_temp_dir("nr_store_corrections");
    let store = FileStore::new(dir.clone()).expect("failed to open store");
    let (s1, s2, _) = sample_entities();

    store.upsert_entities(&[s1.clone(), s2.clone()]).unwrap();
    store
        .upsert_sync_records(&[
            SyncRecord::in_sync(&s1, s1.revision(), s1.revision()),
            SyncRecord::in_sync(&s2, s2.revision(), s2.revision()),
        ])
        .unwrap();
    assert!(store.load_pending_corrections().unwrap().is_empty());

    let Entity::Structure(moved) = s2.clone() else {
        unreachable!()
    };
    let moved = Structure {
        position: point(10.5, 0.0, -2.0),
        ..moved
    };
    let rev = store.record_correction(moved.into()).unwrap();
    assert_eq!(rev, Revision::new(2));

    let pending = store.load_pending_corrections().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id().as_str(), "S2");

    fs::remove_dir_all(dir).ok();
}

#[test]
fn correction_for_unknown_entity_fails() {
    let dir = unique_temp_dir("nr_store_unknown");
    let store = FileStore::new(dir.clone()).expect("failed to open store");
    let s = Structure::new("S9", point(0.0, 0.0, 0.0));
    assert!(store.record_correction(s.into()).is_err());
    fs::remove_dir_all(dir).ok();
}

#[test]
fn findings_are_keyed_by_id() {
    let dir = unique_temp_dir("nr_store_findings");
    let store = FileStore::new(dir.clone()).expect("failed to open store");

    let key = FindingKey::new(FindingKind::UnconnectedEnd, [EntityId::from("P1")])
        .with_qualifier("end");
    let finding = Finding::new(key.clone(), 0.5, Utc::now());
    store.upsert_findings(&[finding.clone()]).unwrap();

    let mut acked = finding.clone();
    acked.status = FindingStatus::Acknowledged;
    store.upsert_findings(&[acked]).unwrap();

    let loaded = store.load_findings().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, key.id());
    assert_eq!(loaded[0].status, FindingStatus::Acknowledged);

    fs::remove_dir_all(dir).ok();
}

#[test]
fn audit_log_appends_lines() {
    let dir = unique_temp_dir("nr_store_audit");
    let store = FileStore::new(dir.clone()).expect("failed to open store");
    let log = store.audit_log().expect("failed to open audit log");
    let cycle = Uuid::new_v4();

    log.append(
        &AuditRecord::new(cycle, AuditOperation::PushToStore, AuditOutcome::Succeeded)
            .entity(EntityId::from("S1")),
    )
    .unwrap();
    log.append(&AuditRecord::new(
        cycle,
        AuditOperation::CycleCompleted,
        AuditOutcome::Succeeded,
    ))
    .unwrap();

    let records = log.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].operation, AuditOperation::PushToStore);
    assert_eq!(records[0].entity_ids, vec![EntityId::from("S1")]);
    assert!(log.path().ends_with("audit.jsonl"));

    fs::remove_dir_all(dir).ok();
}

#[test]
fn beside_places_store_next_to_model() {
    let dir = unique_temp_dir("nr_store_beside");
    fs::create_dir_all(&dir).unwrap();
    let store = FileStore::beside(&dir.join("network.json")).unwrap();
    assert!(store.root().starts_with(&dir));
    assert!(store.root().ends_with(".netrecon/store"));
    fs::remove_dir_all(dir).ok();
}

#[test]
fn memory_store_failure_injection() {
    let store = MemoryStore::new();
    let (s1, _, _) = sample_entities();

    store.fail_upserts("S1", 1, CollabError::unavailable("store", "busy"));
    assert!(store.upsert_entities(&[s1.clone()]).is_err());
    assert!(store.upsert_entities(&[s1.clone()]).is_ok());
    assert_eq!(store.entity(&"S1".into()), Some(s1.clone()));

    store.set_offline(true);
    let err = store.load_sync_state().unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn replace_entity_checks_the_stored_revision() {
    let dir = unique_temp_dir("nr_store_replace");
    let file = FileStore::new(dir.clone()).expect("failed to open store");
    let memory = MemoryStore::new();
    let (s1, _, _) = sample_entities();
    let stores: [&dyn StoreCollaborator; 2] = [&file, &memory];

    for store in stores {
        assert!(store.replace_entity(&s1, None).unwrap());
        // A second create with no expected copy loses to the first.
        assert!(!store.replace_entity(&s1, None).unwrap());

        let bumped = s1.clone().with_revision(Revision::new(2));
        assert!(!store.replace_entity(&bumped, Some(Revision::new(7))).unwrap());
        assert!(store.replace_entity(&bumped, Some(s1.revision())).unwrap());
        let stored = store.load_entity(&"S1".into()).unwrap().unwrap();
        assert_eq!(stored.revision(), Revision::new(2));
    }

    fs::remove_dir_all(dir).ok();
}

#[test]
fn replace_entity_does_not_undo_a_later_correction() {
    let dir = unique_temp_dir("nr_store_replace_correction");
    let store = FileStore::new(dir.clone()).expect("failed to open store");
    let (s1, _, _) = sample_entities();
    store.upsert_entities(&[s1.clone()]).unwrap();
    let planned_against = s1.revision();

    let Entity::Structure(moved) = s1.clone() else {
        unreachable!()
    };
    let corrected = Structure {
        position: point(99.0, 0.0, 0.0),
        ..moved
    };
    store.record_correction(corrected.into()).unwrap();

    let pushed = s1.clone().with_revision(Revision::new(5));
    assert!(!store.replace_entity(&pushed, Some(planned_against)).unwrap());
    let Some(Entity::Structure(kept)) = store.load_entity(&"S1".into()).unwrap() else {
        panic!("S1 missing from the store");
    };
    assert_eq!(kept.position.x, 99.0);

    fs::remove_dir_all(dir).ok();
}

#[test]
fn one_writer_per_store_directory() {
    let dir = unique_temp_dir("nr_store_writer");
    let first = FileStore::new(dir.clone()).expect("failed to open store");
    let second = FileStore::new(dir.clone()).expect("failed to open store");

    let claim = first.claim_writer().unwrap();
    assert!(claim.is_cross_process());
    let err = second.claim_writer().unwrap_err();
    assert!(err.is_retryable());

    drop(claim);
    assert!(second.claim_writer().is_ok());

    fs::remove_dir_all(dir).ok();
}

#[test]
fn concurrent_upserts_from_two_handles_keep_every_row() {
    let dir = unique_temp_dir("nr_store_two_handles");
    let a = FileStore::new(dir.clone()).expect("failed to open store");
    let b = FileStore::new(dir.clone()).expect("failed to open store");

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..20 {
                let s = Structure::new(format!("A{i}"), point(i as f64, 0.0, 0.0));
                a.upsert_entities(&[s.into()]).unwrap();
            }
        });
        scope.spawn(|| {
            for i in 0..20 {
                let s = Structure::new(format!("B{i}"), point(i as f64, 1.0, 0.0));
                b.upsert_entities(&[s.into()]).unwrap();
            }
        });
    });

    assert_eq!(a.load_entities().unwrap().len(), 40);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn memory_store_replace_honours_failure_injection() {
    let store = MemoryStore::new();
    let (s1, _, _) = sample_entities();
    store.fail_upserts("S1", 1, CollabError::rejected("store", "read only"));
    assert!(store.replace_entity(&s1, None).is_err());
    assert!(store.replace_entity(&s1, None).unwrap());
    assert!(store.claim_writer().is_ok_and(|c| !c.is_cross_process()));
}
