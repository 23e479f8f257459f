//! Shared fixtures for the reactive integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use lumen_core::schema::{Table, TableBuilder};
use lumen_core::{DataType, Row, RowId, Value};
use lumen_reactive::{ObjectChange, Projection, ResultsController, SectionChange};
use lumen_storage::StoreContext;

pub const PRODUCTS: &str = "products";

/// A product as seen by a product list.
#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub id: RowId,
    pub name: String,
    pub site_id: i64,
    pub category: Option<String>,
    pub price: i64,
}

impl Projection for Product {
    fn from_row(schema: &Table, row: &Row) -> Self {
        let get = |key: &str| {
            schema
                .get_column_index(key)
                .and_then(|i| row.get(i))
                .cloned()
                .unwrap_or(Value::Null)
        };
        Self {
            id: row.id(),
            name: get("name").as_str().unwrap_or_default().to_string(),
            site_id: get("site_id").as_i64().unwrap_or_default(),
            category: get("category").as_str().map(str::to_string),
            price: get("price").as_i64().unwrap_or_default(),
        }
    }

    fn id(&self) -> RowId {
        self.id
    }
}

pub fn products_table() -> Table {
    TableBuilder::new(PRODUCTS)
        .unwrap()
        .add_column("name", DataType::String)
        .unwrap()
        .add_column("site_id", DataType::Int64)
        .unwrap()
        .add_column("category", DataType::String)
        .unwrap()
        .add_column("price", DataType::Int64)
        .unwrap()
        .add_nullable(&["category"])
        .build()
        .unwrap()
}

pub fn store() -> StoreContext {
    let store = StoreContext::new();
    store.create_table(products_table()).unwrap();
    store
}

pub fn product(id: RowId, name: &str, site_id: i64, category: Option<&str>, price: i64) -> Row {
    Row::new(
        id,
        vec![
            Value::from(name),
            Value::Int64(site_id),
            category.map_or(Value::Null, Value::from),
            Value::Int64(price),
        ],
    )
}

/// Shorthand for an unsectioned product on site 134.
pub fn named(id: RowId, name: &str) -> Row {
    product(id, name, 134, None, 0)
}

pub fn insert_all(store: &StoreContext, rows: Vec<Row>) {
    let mut tx = store.begin();
    for row in rows {
        tx.insert(PRODUCTS, row);
    }
    tx.commit().unwrap();
}

/// Everything a controller reported, in delivery order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    WillChange,
    Object(RowId, ObjectChange),
    Section(SectionChange),
    DidChange,
    Reset,
}

pub type Log = Rc<RefCell<Vec<Event>>>;

/// Registers recording callbacks on every slot of `controller`.
pub fn record<P: Projection>(controller: &ResultsController<P>) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let l = log.clone();
    controller.on_will_change_content(move || l.borrow_mut().push(Event::WillChange));
    let l = log.clone();
    controller.on_did_change_object(move |p: &P, change| {
        l.borrow_mut().push(Event::Object(p.id(), *change))
    });
    let l = log.clone();
    controller.on_did_change_section(move |change| l.borrow_mut().push(Event::Section(change.clone())));
    let l = log.clone();
    controller.on_did_change_content(move || l.borrow_mut().push(Event::DidChange));
    let l = log.clone();
    controller.on_did_reset_content(move || l.borrow_mut().push(Event::Reset));

    log
}

pub type Layout = Vec<(String, Vec<RowId>)>;

pub fn layout_of<P: Projection>(controller: &ResultsController<P>) -> Layout {
    controller
        .sections()
        .iter()
        .map(|s| (s.name().to_string(), s.objects().iter().map(|p| p.id()).collect()))
        .collect()
}

pub fn ids_of<P: Projection>(controller: &ResultsController<P>) -> Vec<RowId> {
    controller.fetched_objects().iter().map(|p| p.id()).collect()
}

/// Applies one batch of recorded events to a copy of the previous layout.
///
/// Deletes and move sources address `old`; section inserts, row inserts, move
/// destinations and updates address the result. Returns an error describing
/// the first event that does not fit.
pub fn replay(old: &Layout, events: &[Event]) -> Result<Layout, String> {
    let mut removed_rows: Vec<(usize, usize, RowId)> = Vec::new();
    let mut removed_sections: Vec<usize> = Vec::new();
    let mut added_sections: Vec<(usize, String)> = Vec::new();
    let mut added_rows: Vec<(usize, usize, RowId)> = Vec::new();
    let mut updates: Vec<(usize, usize, RowId)> = Vec::new();

    for event in events {
        match event {
            Event::Object(id, ObjectChange::Delete { index_path }) => {
                removed_rows.push((index_path.section, index_path.row, *id))
            }
            Event::Object(id, ObjectChange::Insert { new_index_path }) => {
                added_rows.push((new_index_path.section, new_index_path.row, *id))
            }
            Event::Object(id, ObjectChange::Move { from, to }) => {
                removed_rows.push((from.section, from.row, *id));
                added_rows.push((to.section, to.row, *id));
            }
            Event::Object(id, ObjectChange::Update { index_path }) => {
                updates.push((index_path.section, index_path.row, *id))
            }
            Event::Section(SectionChange::Delete { index, .. }) => removed_sections.push(*index),
            Event::Section(SectionChange::Insert { index, name }) => {
                added_sections.push((*index, name.clone()))
            }
            Event::WillChange | Event::DidChange | Event::Reset => {}
        }
    }

    let mut layout: Vec<(String, Vec<Option<RowId>>)> = old
        .iter()
        .map(|(name, ids)| (name.clone(), ids.iter().copied().map(Some).collect()))
        .collect();

    for (s, r, id) in &removed_rows {
        let slot = layout
            .get_mut(*s)
            .and_then(|(_, rows)| rows.get_mut(*r))
            .ok_or_else(|| format!("delete of {} at [{}, {}] out of range", id, s, r))?;
        if *slot != Some(*id) {
            return Err(format!("delete of {} at [{}, {}] found {:?}", id, s, r, slot));
        }
        *slot = None;
    }
    let mut layout: Vec<(String, Vec<RowId>)> = layout
        .into_iter()
        .map(|(name, rows)| (name, rows.into_iter().flatten().collect()))
        .collect();

    removed_sections.sort_unstable();
    for s in removed_sections.iter().rev() {
        if *s >= layout.len() {
            return Err(format!("section delete {} out of range", s));
        }
        if !layout[*s].1.is_empty() {
            return Err(format!("section {} deleted while holding rows", s));
        }
        layout.remove(*s);
    }

    added_sections.sort();
    for (s, name) in added_sections {
        if s > layout.len() {
            return Err(format!("section insert {} out of range", s));
        }
        layout.insert(s, (name, Vec::new()));
    }

    added_rows.sort_unstable();
    for (s, r, id) in added_rows {
        let rows = &mut layout
            .get_mut(s)
            .ok_or_else(|| format!("insert of {} into missing section {}", id, s))?
            .1;
        if r > rows.len() {
            return Err(format!("insert of {} at [{}, {}] out of range", id, s, r));
        }
        rows.insert(r, id);
    }

    for (s, r, id) in updates {
        match layout.get(s).and_then(|(_, rows)| rows.get(r)) {
            Some(found) if *found == id => {}
            other => return Err(format!("update of {} at [{}, {}] found {:?}", id, s, r, other)),
        }
    }

    Ok(layout)
}

/// Splits a log into the events of each will/did bracket.
pub fn batches(log: &[Event]) -> Vec<Vec<Event>> {
    let mut out = Vec::new();
    let mut current: Option<Vec<Event>> = None;
    for event in log {
        match event {
            Event::WillChange => current = Some(Vec::new()),
            Event::DidChange => out.extend(current.take()),
            other => {
                if let Some(batch) = current.as_mut() {
                    batch.push(other.clone());
                }
            }
        }
    }
    out
}
