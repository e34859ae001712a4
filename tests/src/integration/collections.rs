//! # Collection Flows
//!
//! One client seeds key/value, set and hash data; a peer reads it back the
//! way the demo client does.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use apid::{no_callback, Apid, ApidResult, InMemoryBroker, SetEntry};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Seed the demo data set and wait until the broker has applied it.
    async fn seed(broker: &InMemoryBroker) -> Apid {
        let seeder = client(broker).await;
        seeder.hash_set("test-hash", "a", "b", no_callback::<i64>()).unwrap();
        seeder.hash_set("test-hash", "a", "c", no_callback::<i64>()).unwrap();
        seeder.hash_set("test-hash", "d", "t", no_callback::<i64>()).unwrap();
        seeder.set_clear("test3", no_callback::<i64>()).unwrap();
        seeder.set_add("test3", "a b", no_callback::<i64>()).unwrap();
        seeder.set_add("test3", "c", no_callback::<i64>()).unwrap();
        let stop = seeder.stop_handle();
        seeder
            .kv_set("note", "it is the note!", Some(move |r: ApidResult<()>| {
                r.unwrap();
                stop.stop();
            }))
            .unwrap();
        run_until_stopped(&seeder).await.unwrap();
        seeder
    }

    #[tokio::test]
    async fn test_peer_reads_seeded_data() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let _seeder = seed(&broker).await;
        let reader = client(&broker).await;
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = log.clone();
        reader
            .kv_get("note", move |r| sink.lock().push(format!("note: {:?}", r.unwrap())))
            .unwrap();
        for member in ["a c", "c"] {
            let sink = log.clone();
            reader
                .set_contains("test3", member, move |r| {
                    sink.lock().push(format!("detect({}): {}", member, r.unwrap()))
                })
                .unwrap();
        }
        let sink = log.clone();
        reader
            .set_remove("test3", "a b", Some(move |r: ApidResult<i64>| {
                sink.lock().push(format!("removed: {}", r.unwrap()))
            }))
            .unwrap();
        let sink = log.clone();
        reader
            .hash_get("test-hash", "a", move |r| sink.lock().push(format!("hash: {:?}", r.unwrap())))
            .unwrap();
        let sink = log.clone();
        let stop = reader.stop_handle();
        reader
            .set_iterate("test3", move |entry| match entry.unwrap() {
                SetEntry::Member(m) => sink.lock().push(format!("SET -> {}", m)),
                SetEntry::Done => stop.stop(),
            })
            .unwrap();

        run_until_stopped(&reader).await.unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "note: Some(\"it is the note!\")",
                "detect(a c): false",
                "detect(c): true",
                "removed: 1",
                "hash: Some(\"c\")",
                "SET -> c",
            ]
        );
    }

    #[tokio::test]
    async fn test_set_writes_are_idempotent_across_clients() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let first = client(&broker).await;
        let second = client(&broker).await;

        let added = Arc::new(Mutex::new(Vec::new()));
        for apid in [&first, &second] {
            let sink = added.clone();
            let stop = apid.stop_handle();
            apid.set_add("members", "x", Some(move |r: ApidResult<i64>| {
                sink.lock().push(r.unwrap());
                stop.stop();
            }))
            .unwrap();
            run_until_stopped(apid).await.unwrap();
        }
        assert_eq!(*added.lock(), vec![1, 0]);

        let members = Arc::new(Mutex::new(Vec::new()));
        let sink = members.clone();
        let stop = first.stop_handle();
        first
            .set_iterate("members", move |entry| {
                let entry = entry.unwrap();
                if entry == SetEntry::Done {
                    stop.stop();
                }
                sink.lock().push(entry);
            })
            .unwrap();
        run_until_stopped(&first).await.unwrap();
        assert_eq!(
            *members.lock(),
            vec![SetEntry::Member("x".to_string()), SetEntry::Done]
        );
    }

    #[tokio::test]
    async fn test_hash_update_reports_existing_field() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let apid = client(&broker).await;
        let created = Arc::new(Mutex::new(Vec::new()));

        for value in ["b", "c"] {
            let sink = created.clone();
            apid.hash_set("h", "a", value, Some(move |r: ApidResult<i64>| sink.lock().push(r.unwrap())))
                .unwrap();
        }
        let stop = apid.stop_handle();
        let value = Arc::new(Mutex::new(None));
        let sink = value.clone();
        apid.hash_get("h", "a", move |r| {
            *sink.lock() = Some(r.unwrap());
            stop.stop();
        })
        .unwrap();

        run_until_stopped(&apid).await.unwrap();
        assert_eq!(*created.lock(), vec![1, 0]);
        assert_eq!(value.lock().take(), Some(Some("c".to_string())));
    }
}
