use super::Model;
use super::descriptor::ModelMeta;
use lazy_static::lazy_static;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

type ErasedMeta = Arc<dyn Any + Send + Sync>;
type MetaCell = Arc<OnceLock<ErasedMeta>>;

// Global property metadata registry, one cell per model type
lazy_static! {
    static ref REGISTRY: RwLock<HashMap<TypeId, MetaCell>> = RwLock::new(HashMap::new());
}

/// Returns the metadata of `M`, building it on first use.
///
/// The global map lock is only held to find or insert the per-type cell;
/// building happens inside that cell, so concurrent first callers for the
/// same type wait for a single build and all receive the same instance.
pub fn metadata_for<M: Model>() -> Arc<ModelMeta<M>> {
    let cell = cell_for(TypeId::of::<M>());
    let erased = cell
        .get_or_init(|| {
            let meta = ModelMeta::<M>::build();
            tracing::debug!(
                model = meta.type_name(),
                properties = meta.len(),
                "built model metadata"
            );
            Arc::new(meta) as ErasedMeta
        })
        .clone();

    erased
        .downcast::<ModelMeta<M>>()
        .unwrap_or_else(|_| panic!("registry entry for {} holds another type", std::any::type_name::<M>()))
}

/// Number of model types whose metadata cell exists.
pub fn registered_models() -> usize {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}

fn cell_for(type_id: TypeId) -> MetaCell {
    if let Some(cell) = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return Arc::clone(cell);
    }

    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(registry.entry(type_id).or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    static DESCRIBE_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counter {
        hits: i64,
    }

    impl Model for Counter {
        fn describe(model: &mut ModelDescriptor<Self>) {
            DESCRIBE_CALLS.fetch_add(1, Ordering::SeqCst);
            model
                .constructor(Counter::default)
                .column("hits", |c| &c.hits, |c, v| c.hits = v);
        }
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    metadata_for::<Counter>()
                })
            })
            .collect();

        let metas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for meta in &metas[1..] {
            assert!(Arc::ptr_eq(&metas[0], meta));
        }
        assert_eq!(DESCRIBE_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(metas[0].len(), 1);
        assert!(registered_models() >= 1);
    }
}
