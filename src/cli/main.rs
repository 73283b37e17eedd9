//! o5m boundary extraction pipeline.
//!
//! Builds a boundary database in stages: index resolved way geometries, index
//! referenced sub-relations, build multipolygons, attach center points, then
//! export bulk-index documents.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hashbrown::{HashMap, HashSet};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use laurel::geometry::compute_centroid;
use laurel::models::{Centroid, Point, RefKind, Relation};
use laurel::o5m::{O5mReader, RecordKind};
use laurel::resolve::doc::make_boundary_doc;
use laurel::resolve::nodes::{build_node_index, linestring_for_way};
use laurel::resolve::{build_location, AdminPolicy, RelationPolicy};
use laurel::store::BoundaryStore;

#[derive(Parser, Debug)]
#[command(name = "laurel")]
#[command(about = "OpenStreetMap o5m boundary extraction tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count o5m records per kind
    Count {
        /// o5m file path
        o5m: PathBuf,
    },
    /// Resolve way geometries against the node section and index them
    IndexWays {
        /// o5m file path
        o5m: PathBuf,
        /// boundary database path
        db: PathBuf,
    },
    /// Index sub-relations referenced by boundary relations
    IndexRelations {
        /// o5m file path
        o5m: PathBuf,
        /// boundary database path
        db: PathBuf,
    },
    /// Build boundary multipolygons from indexed ways and relations
    IndexLocations {
        /// o5m file path
        o5m: PathBuf,
        /// boundary database path
        db: PathBuf,
        /// only process this relation id
        #[arg(long)]
        id: Option<i64>,
        /// worker thread count
        #[arg(long, default_value = "1")]
        workers: usize,
    },
    /// Attach center points to boundaries
    IndexCenters {
        /// o5m file path
        o5m: PathBuf,
        /// boundary database path
        db: PathBuf,
    },
    /// Export boundary documents as JSONL
    Export {
        /// o5m file path
        o5m: PathBuf,
        /// boundary database path
        db: PathBuf,
        /// output JSONL path
        out: PathBuf,
        /// only export this relation id
        #[arg(long)]
        id: Option<i64>,
    },
}

fn open_reader(path: &Path) -> Result<O5mReader<File>> {
    let file =
        File::open(path).with_context(|| format!("cannot open o5m file {}", path.display()))?;
    Ok(O5mReader::new(file)?)
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn count(o5m: &Path) -> Result<()> {
    let mut reader = open_reader(o5m)?;
    let mut nodes = 0u64;
    let mut ways = 0u64;
    let mut relations = 0u64;
    while let Some(kind) = reader.next()? {
        match kind {
            RecordKind::Node => nodes += 1,
            RecordKind::Way => ways += 1,
            RecordKind::Relation => relations += 1,
            RecordKind::BBox => {}
        }
    }
    println!("resets {}", reader.reset_points().len());
    println!("nodes {}", nodes);
    println!("ways {}", ways);
    println!("relations {}", relations);
    Ok(())
}

fn index_ways(o5m: &Path, db: &Path) -> Result<()> {
    let mut reader = open_reader(o5m)?;
    let store = BoundaryStore::open(db)?;
    let nodes = build_node_index(&mut reader)?;
    info!(nodes = nodes.len(), "node index built");

    let pb = ProgressBar::new_spinner();
    let mut indexed = 0u64;
    while let Some(kind) = reader.next()? {
        if kind != RecordKind::Way {
            continue;
        }
        let line = linestring_for_way(reader.way(), &nodes)?;
        store.put_way(&line)?;
        indexed += 1;
        pb.inc(1);
    }
    pb.finish_and_clear();
    store.flush()?;
    info!(ways = indexed, "way indexing done");
    Ok(())
}

fn index_relations(o5m: &Path, db: &Path) -> Result<()> {
    let mut reader = open_reader(o5m)?;
    let store = BoundaryStore::open(db)?;

    // Pass 1: list relations that other relations build geometry from.
    info!("listing relations to collect");
    let mut kept: HashSet<i64> = HashSet::new();
    while let Some(kind) = reader.next()? {
        if kind != RecordKind::Relation {
            continue;
        }
        let relation = reader.relation();
        if relation.tag("type") == Some("multilinestring") {
            kept.insert(relation.id);
            continue;
        }
        for member in &relation.refs {
            if member.kind == RefKind::Relation
                && (member.role == "inner" || member.role == "outer")
            {
                kept.insert(member.id);
            }
        }
    }
    let resets = reader.reset_points().to_vec();
    if resets.len() < 3 {
        bail!("could not collect reset points");
    }

    // Pass 2: rewind to the relations section and store the kept ones.
    info!(kept = kept.len(), "collecting");
    reader.seek(resets[2])?;
    let mut indexed = 0u64;
    while let Some(kind) = reader.next()? {
        if kind != RecordKind::Relation {
            continue;
        }
        let relation = reader.relation();
        if !kept.contains(&relation.id) {
            continue;
        }
        store.put_relation(relation)?;
        indexed += 1;
    }
    store.flush()?;
    info!(relations = indexed, "relation indexing done");
    Ok(())
}

fn index_locations(o5m: &Path, db: &Path, id: Option<i64>, workers: usize) -> Result<()> {
    let mut reader = open_reader(o5m)?;
    let store = BoundaryStore::open(db)?;
    let policy = AdminPolicy;

    let mut pending: Vec<Relation> = Vec::new();
    while let Some(kind) = reader.next()? {
        if kind != RecordKind::Relation {
            continue;
        }
        let relation = reader.relation();
        if let Some(id) = id {
            if relation.id != id {
                continue;
            }
        }
        if policy.skip(relation) || store.has_location(relation.id)? {
            continue;
        }
        pending.push(relation.clone());
        if id.is_some() {
            break;
        }
    }
    info!(pending = pending.len(), workers, "building locations");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    let pb = progress_bar(pending.len() as u64)?;
    let (converted, failed) = pool.install(|| {
        pending
            .par_iter()
            .map(|relation| {
                let outcome = build_location(relation, &store, &policy)
                    .and_then(|location| match location {
                        Some(location) => {
                            store.put_location(relation.id, &location)?;
                            Ok(Some(()))
                        }
                        None => Ok(None),
                    });
                pb.inc(1);
                match outcome {
                    Ok(Some(())) => (1u64, 0u64),
                    Ok(None) => (0, 0),
                    Err(error) => {
                        warn!(
                            relation = relation.id,
                            name = relation.name(),
                            level = relation.tag("admin_level").unwrap_or(""),
                            %error,
                            "cannot build location"
                        );
                        (0, 1)
                    }
                }
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    });
    pb.finish_and_clear();
    store.flush()?;
    info!(
        converted,
        failed,
        total = pending.len(),
        "location indexing done"
    );
    Ok(())
}

fn index_centers(o5m: &Path, db: &Path) -> Result<()> {
    let store = BoundaryStore::open(db)?;
    let policy = AdminPolicy;

    // Pass 1: relations with a dedicated admin centre node defer to pass 2,
    // the rest get a computed centroid right away.
    let mut reader = open_reader(o5m)?;
    let mut center_nodes: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut polygons = 0u64;
    let mut indexed = 0u64;
    while let Some(kind) = reader.next()? {
        if kind != RecordKind::Relation {
            continue;
        }
        let relation = reader.relation();
        if policy.skip(relation) {
            continue;
        }
        let Some(location) = store.get_location(relation.id)? else {
            continue;
        };
        polygons += 1;
        if location.is_empty() {
            continue;
        }
        let center_id = relation.refs.iter().rev().find_map(|member| {
            (member.kind == RefKind::Node
                && (member.role == "admin_center" || member.role == "admin_centre"))
                .then_some(member.id)
        });
        if let Some(node_id) = center_id {
            center_nodes.entry(node_id).or_default().push(relation.id);
            continue;
        }
        match compute_centroid(&location) {
            Ok(Some(centroid)) => {
                store.put_centroid(relation.id, &centroid)?;
                indexed += 1;
            }
            Ok(None) => {
                warn!(
                    relation = relation.id,
                    name = relation.name(),
                    level = relation.tag("admin_level").unwrap_or(""),
                    "cannot get admin center"
                );
            }
            Err(error) => {
                warn!(
                    relation = relation.id,
                    name = relation.name(),
                    level = relation.tag("admin_level").unwrap_or(""),
                    %error,
                    "cannot compute centroid"
                );
            }
        }
    }

    // Pass 2: resolve the admin centre nodes from the node section.
    let mut reader = open_reader(o5m)?;
    while let Some(kind) = reader.next()? {
        if reader.reset_points().len() >= 2 {
            break;
        }
        if kind != RecordKind::Node {
            continue;
        }
        let node = reader.node();
        let Some(relation_ids) = center_nodes.get(&node.id) else {
            continue;
        };
        let centroid = Centroid {
            lon: node.lon as f64 / Point::SCALE,
            lat: node.lat as f64 / Point::SCALE,
            node_id: Some(node.id),
        };
        for &relation_id in relation_ids {
            store.put_centroid(relation_id, &centroid)?;
            indexed += 1;
        }
    }
    store.flush()?;
    info!(indexed, polygons, "center indexing done");
    Ok(())
}

fn export(o5m: &Path, db: &Path, out: &Path, id: Option<i64>) -> Result<()> {
    let mut reader = open_reader(o5m)?;
    let store = BoundaryStore::open(db)?;
    let file =
        File::create(out).with_context(|| format!("cannot create {}", out.display()))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0u64;
    while let Some(kind) = reader.next()? {
        if kind != RecordKind::Relation {
            continue;
        }
        let relation = reader.relation();
        if let Some(id) = id {
            if relation.id != id {
                continue;
            }
        }
        let Some(location) = store.get_location(relation.id)? else {
            continue;
        };
        let Some(center) = store.get_centroid(relation.id)? else {
            continue;
        };
        let doc = match make_boundary_doc(relation, &center, &location) {
            Ok(doc) => doc,
            Err(error) => {
                warn!(relation = relation.id, name = relation.name(), %error, "cannot export");
                continue;
            }
        };
        serde_json::to_writer(&mut writer, &doc.into_envelope())?;
        writeln!(writer)?;
        written += 1;
        if id.is_some() {
            break;
        }
    }
    writer.flush()?;
    info!(written, "export done");
    Ok(())
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    match cli.command {
        Command::Count { o5m } => count(&o5m),
        Command::IndexWays { o5m, db } => index_ways(&o5m, &db),
        Command::IndexRelations { o5m, db } => index_relations(&o5m, &db),
        Command::IndexLocations {
            o5m,
            db,
            id,
            workers,
        } => index_locations(&o5m, &db, id, workers),
        Command::IndexCenters { o5m, db } => index_centers(&o5m, &db),
        Command::Export { o5m, db, out, id } => export(&o5m, &db, &out, id),
    }
}
