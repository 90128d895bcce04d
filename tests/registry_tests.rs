/// Registry tests
///
/// First use of model metadata from many threads at once.
/// Run with: cargo test --test registry_tests

use std::sync::{Arc, Barrier};
use std::thread;
use topaz::{Model, metadata_for};

#[derive(Debug, Default, Model)]
struct Invoice {
    id: i64,
    #[prop(name = "total_cents")]
    total: i64,
    #[prop(has_one)]
    customer: Option<Party>,
}

#[derive(Debug, Default, Model)]
struct Party {
    name: String,
}

#[test]
fn test_concurrent_first_use_builds_one_mapping() {
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                metadata_for::<Invoice>()
            })
        })
        .collect();

    let metas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for meta in &metas[1..] {
        assert!(Arc::ptr_eq(&metas[0], meta));
    }

    let meta = &metas[0];
    assert_eq!(meta.len(), 3);
    assert_eq!(meta.lookup_column("total_cents").map(|p| p.name()), Some("total"));
    assert!(Arc::ptr_eq(meta, &Invoice::meta()));
}

#[test]
fn test_related_model_registered_on_use() {
    let meta = Party::meta();
    assert_eq!(meta.table_name(), "party");
    assert_eq!(meta.get("name").map(|p| p.type_name()), Some("String"));
}
