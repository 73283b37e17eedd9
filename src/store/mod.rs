//! Persistent key/value storage for decoded entities and derived products.
//!
//! One sled database with a tree per entity kind. Keys are big-endian ids so
//! range scans come out in id order; values are JSON, which keeps the trees
//! inspectable with standard tooling.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};

use crate::models::{Centroid, Linestring, Location, Relation};

/// Read access to stored entities, as needed by geometry resolution. Ways are
/// stored with their node references already resolved to coordinates.
pub trait BoundarySource {
    fn way(&self, id: i64) -> Result<Option<Linestring>>;
    fn relation(&self, id: i64) -> Result<Option<Relation>>;
}

/// Handle to the boundary database. Cloning is cheap and clones share the
/// underlying sled handles, so one store can serve several worker threads.
#[derive(Clone)]
pub struct BoundaryStore {
    db: Db,
    ways: Tree,
    relations: Tree,
    locations: Tree,
    centroids: Tree,
}

fn get_json<T: DeserializeOwned>(tree: &Tree, id: i64) -> Result<Option<T>> {
    match tree.get(id.to_be_bytes())? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt record for id {}", id))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(tree: &Tree, id: i64, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    tree.insert(id.to_be_bytes(), bytes)?;
    Ok(())
}

impl BoundaryStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .with_context(|| format!("cannot open database at {}", path.display()))?;
        Ok(Self {
            ways: db.open_tree("ways")?,
            relations: db.open_tree("relations")?,
            locations: db.open_tree("locations")?,
            centroids: db.open_tree("centroids")?,
            db,
        })
    }

    pub fn put_way(&self, way: &Linestring) -> Result<()> {
        put_json(&self.ways, way.id, way)
    }

    pub fn put_relation(&self, relation: &Relation) -> Result<()> {
        put_json(&self.relations, relation.id, relation)
    }

    pub fn put_location(&self, id: i64, location: &Location) -> Result<()> {
        put_json(&self.locations, id, location)
    }

    pub fn get_location(&self, id: i64) -> Result<Option<Location>> {
        get_json(&self.locations, id)
    }

    pub fn has_location(&self, id: i64) -> Result<bool> {
        Ok(self.locations.contains_key(id.to_be_bytes())?)
    }

    pub fn put_centroid(&self, id: i64, centroid: &Centroid) -> Result<()> {
        put_json(&self.centroids, id, centroid)
    }

    pub fn get_centroid(&self, id: i64) -> Result<Option<Centroid>> {
        get_json(&self.centroids, id)
    }

    /// Stored relations in ascending id order.
    pub fn relations(&self) -> impl Iterator<Item = Result<Relation>> + '_ {
        self.relations.iter().values().map(|value| {
            let bytes = value?;
            Ok(serde_json::from_slice(&bytes)?)
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl BoundarySource for BoundaryStore {
    fn way(&self, id: i64) -> Result<Option<Linestring>> {
        get_json(&self.ways, id)
    }

    fn relation(&self, id: i64) -> Result<Option<Relation>> {
        get_json(&self.relations, id)
    }
}
