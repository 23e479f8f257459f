//! Property-based tests for lumen-reactive using proptest.

mod common;

use std::cmp::Reverse;
use std::collections::BTreeSet;

use common::*;
use lumen_core::RowId;
use lumen_reactive::{EntityListener, FetchConfig, Predicate, ResultsController, SortDescriptor};
use std::cell::RefCell;
use std::rc::Rc;
use lumen_storage::StoreContext;
use proptest::prelude::*;

const NAMES: [&str; 6] = ["ant", "Bee", "bee", "cat", "Dog", "eel"];
const CATEGORIES: [Option<&str>; 3] = [None, Some("x"), Some("y")];

#[derive(Clone, Debug)]
struct Attrs {
    name: usize,
    site: i64,
    category: usize,
    price: i64,
}

#[derive(Clone, Debug)]
enum Op {
    Upsert(RowId, Attrs),
    Delete(RowId),
}

fn attrs() -> impl Strategy<Value = Attrs> {
    (0..NAMES.len(), 0i64..3, 0..CATEGORIES.len(), 0i64..4).prop_map(
        |(name, site, category, price)| Attrs {
            name,
            site,
            category,
            price,
        },
    )
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..16, attrs()).prop_map(|(id, a)| Op::Upsert(id, a)),
        1 => (0u64..16).prop_map(Op::Delete),
    ]
}

fn row(id: RowId, a: &Attrs) -> lumen_core::Row {
    product(id, NAMES[a.name], a.site, CATEGORIES[a.category], a.price)
}

fn config(sectioned: bool, limit: Option<usize>) -> FetchConfig {
    let mut builder = FetchConfig::builder(PRODUCTS).predicate(Predicate::ne("site_id", 0i64));
    if sectioned {
        builder = builder
            .sort_by(SortDescriptor::ascending("category"))
            .section_key("category");
    }
    builder = builder
        .sort_by(SortDescriptor::ascending("name").case_insensitive())
        .sort_by(SortDescriptor::descending("price"));
    if let Some(limit) = limit {
        builder = builder.fetch_limit(limit);
    }
    builder.build()
}

/// Computes the layout the controller should show, straight from the store.
fn expected(store: &StoreContext, sectioned: bool, limit: Option<usize>) -> Layout {
    let rows = store.fetch_all(PRODUCTS).unwrap();
    let schema = store.schema(PRODUCTS).unwrap();
    let mut products: Vec<Product> = rows
        .iter()
        .map(|r| <Product as lumen_reactive::Projection>::from_row(&schema, r))
        .filter(|p| p.site_id != 0)
        .collect();
    products.sort_by_key(|p| {
        (
            if sectioned { p.category.clone() } else { None },
            p.name.to_lowercase(),
            p.name.clone(),
            Reverse(p.price),
            p.id,
        )
    });
    products.truncate(limit.unwrap_or(usize::MAX));

    let mut layout: Layout = Vec::new();
    if !sectioned {
        layout.push((String::new(), Vec::new()));
    }
    for p in products {
        let name = if sectioned {
            p.category.clone().unwrap_or_default()
        } else {
            String::new()
        };
        match layout.iter_mut().find(|(n, _)| *n == name) {
            Some((_, ids)) => ids.push(p.id),
            None => layout.push((name, vec![p.id])),
        }
    }
    layout
}

fn apply(store: &StoreContext, ops: &[Op]) {
    let mut present: BTreeSet<RowId> = store
        .fetch_all(PRODUCTS)
        .unwrap()
        .iter()
        .map(|r| r.id())
        .collect();
    let mut tx = store.begin();
    for op in ops {
        match op {
            Op::Upsert(id, a) => {
                tx.upsert(PRODUCTS, row(*id, a));
                present.insert(*id);
            }
            Op::Delete(id) => {
                if present.remove(id) {
                    tx.delete(PRODUCTS, *id);
                }
            }
        }
    }
    tx.commit().unwrap();
}

proptest! {
    /// Visible rows always equal the first K matches in sort order, grouped
    /// into sections by their leading section key.
    #[test]
    fn layout_matches_brute_force(
        initial in prop::collection::vec((0u64..16, attrs()), 0..12),
        rounds in prop::collection::vec(prop::collection::vec(op(), 1..8), 1..6),
        sectioned in any::<bool>(),
        limit in prop::option::of(1usize..6),
    ) {
        let store = store();
        apply(&store, &initial.iter().map(|(id, a)| Op::Upsert(*id, a.clone())).collect::<Vec<_>>());

        let controller: ResultsController<Product> =
            ResultsController::new(&store, config(sectioned, limit));
        controller.perform_fetch().unwrap();
        prop_assert_eq!(layout_of(&controller), expected(&store, sectioned, limit));

        for ops in &rounds {
            apply(&store, ops);
            let layout = layout_of(&controller);
            prop_assert_eq!(&layout, &expected(&store, sectioned, limit));
            prop_assert!(controller.number_of_objects() <= limit.unwrap_or(usize::MAX));
        }
    }

    /// Each processed batch, replayed onto the previous layout, yields the
    /// controller's new layout.
    #[test]
    fn events_replay_to_new_layout(
        initial in prop::collection::vec((0u64..16, attrs()), 0..12),
        rounds in prop::collection::vec(prop::collection::vec(op(), 1..8), 1..6),
        sectioned in any::<bool>(),
        limit in prop::option::of(1usize..6),
    ) {
        let store = store();
        apply(&store, &initial.iter().map(|(id, a)| Op::Upsert(*id, a.clone())).collect::<Vec<_>>());

        let controller: ResultsController<Product> =
            ResultsController::new(&store, config(sectioned, limit));
        controller.perform_fetch().unwrap();
        let log = record(&controller);

        for ops in &rounds {
            let before = layout_of(&controller);
            log.borrow_mut().clear();
            apply(&store, ops);

            let recorded = log.borrow().clone();
            let grouped = batches(&recorded);
            prop_assert!(grouped.len() <= 1);
            let events = grouped.into_iter().next().unwrap_or_default();
            prop_assert_eq!(replay(&before, &events), Ok(layout_of(&controller)));
            if !sectioned {
                prop_assert!(!events.iter().any(|e| matches!(e, Event::Section(_))));
            }
        }
    }

    /// A second fetch with no intervening mutation changes nothing and
    /// reports nothing.
    #[test]
    fn refetch_is_idempotent(
        initial in prop::collection::vec((0u64..16, attrs()), 0..16),
        sectioned in any::<bool>(),
        limit in prop::option::of(1usize..6),
    ) {
        let store = store();
        apply(&store, &initial.iter().map(|(id, a)| Op::Upsert(*id, a.clone())).collect::<Vec<_>>());

        let controller: ResultsController<Product> =
            ResultsController::new(&store, config(sectioned, limit));
        controller.perform_fetch().unwrap();
        let log = record(&controller);
        let first = layout_of(&controller);

        controller.perform_fetch().unwrap();
        prop_assert_eq!(layout_of(&controller), first);
        prop_assert!(log.borrow().is_empty());
    }

    /// A listener reports exactly one callback for every commit that changes
    /// its identity's existence or attributes, and none otherwise.
    #[test]
    fn listener_fires_once_per_effective_commit(
        watched in 0u64..16,
        rounds in prop::collection::vec(prop::collection::vec(op(), 1..8), 1..8),
    ) {
        let store = store();
        let listener: EntityListener<Product> = EntityListener::new(&store, PRODUCTS, watched);
        let seen: Rc<RefCell<Vec<Option<Product>>>> = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        listener.on_upsert(move |p| s.borrow_mut().push(Some(p.clone())));
        let s = seen.clone();
        listener.on_delete(move || s.borrow_mut().push(None));

        for ops in &rounds {
            let before = store.get(PRODUCTS, watched);
            seen.borrow_mut().clear();
            apply(&store, ops);
            let after = store.get(PRODUCTS, watched);

            let changed = match (&before, &after) {
                (Some(a), Some(b)) => !a.same_values(b),
                (None, None) => false,
                _ => true,
            };
            let seen = seen.borrow();
            prop_assert_eq!(seen.len(), usize::from(changed));
            if let Some(last) = seen.last() {
                prop_assert_eq!(last.as_ref().map(|p| p.id), after.as_ref().map(|r| r.id()));
            }
        }
    }
}
