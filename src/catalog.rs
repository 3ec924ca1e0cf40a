//! Catalog Store: deduplicated track records with their feature vectors.
//!
//! Rows are ingested from a CSV export or a SQLite table. Processing follows
//! a fixed order per row:
//! 1. drop rows whose identifier was already seen (first occurrence wins,
//!    even if that first row is later rejected)
//! 2. coerce popularity to a number, dropping rows where that fails
//! 3. coerce every usable feature, dropping rows with an unparseable value
//!
//! The store is immutable once built.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::features::{FeatureSchema, FeatureVector};
use crate::models::{CatalogStats, TrackRecord};
use crate::progress::PhaseProgress;

/// Canonical identifier column
pub const ID_COLUMN: &str = "track_id";
/// Accepted alias, renamed to `track_id` on load
pub const ID_ALIAS_COLUMN: &str = "id";
pub const POPULARITY_COLUMN: &str = "popularity";

/// Default table name for SQLite datasets
pub const DEFAULT_TABLE: &str = "tracks";

#[derive(Debug)]
pub struct CatalogStore {
    schema: FeatureSchema,
    tracks: Vec<TrackRecord>,
    positions: FxHashMap<String, usize>,
    mean: FeatureVector,
}

impl CatalogStore {
    /// Build a store from already-typed records (synthetic catalogs, tests).
    /// Duplicate identifiers are dropped, keeping the first.
    pub fn from_records(
        schema: FeatureSchema,
        records: impl IntoIterator<Item = TrackRecord>,
    ) -> Result<Self, LoadError> {
        let mut builder = CatalogBuilder::new(schema);
        for record in records {
            builder.push_record(record);
        }
        builder.finish("in-memory").map(|(store, _)| store)
    }

    /// Load a dataset, picking the reader from the file extension.
    pub fn load(path: &Path, table: &str) -> Result<(Self, CatalogStats), LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Self::load_csv(path),
            Some("sqlite") | Some("sqlite3") | Some("db") => Self::load_sqlite(path, table),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn load_csv(path: &Path) -> Result<(Self, CatalogStats), LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let start = Instant::now();
        info!("Reading CSV catalog: {:?}", path);

        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let layout = ColumnLayout::resolve(&headers)?;
        let mut builder = CatalogBuilder::new(layout.schema.clone());

        let mut progress = PhaseProgress::spinner("Reading tracks");
        for result in reader.records() {
            let record = result?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let features: Vec<&str> = layout.feature_columns.iter().map(|&i| field(i)).collect();
            builder.push_row(field(layout.id_column), field(layout.popularity_column), &features);
            progress.inc();
        }
        progress.finish(format!("Read {} rows", builder.stats.rows_read));

        let (store, mut stats) = builder.finish(&path.display().to_string())?;
        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok((store, stats))
    }

    pub fn load_sqlite(path: &Path, table: &str) -> Result<(Self, CatalogStats), LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let start = Instant::now();
        info!("Opening SQLite catalog: {:?} (table {})", path, table);

        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let quoted = format!("\"{}\"", table.replace('"', "\"\""));
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quoted), [], |row| {
            row.get(0)
        })?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quoted))?;
        let headers: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let layout = ColumnLayout::resolve(&headers)?;
        let mut builder = CatalogBuilder::new(layout.schema.clone());

        let mut progress = PhaseProgress::bar("Reading tracks", count.max(0) as u64);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id = sql_text(row.get_ref(layout.id_column)?);
            let popularity = sql_text(row.get_ref(layout.popularity_column)?);
            let features = layout
                .feature_columns
                .iter()
                .map(|&i| row.get_ref(i).map(sql_text))
                .collect::<Result<Vec<String>, _>>()?;
            let features: Vec<&str> = features.iter().map(String::as_str).collect();
            builder.push_row(&id, &popularity, &features);
            progress.inc();
        }
        progress.finish(format!("Read {} rows", builder.stats.rows_read));

        let (store, mut stats) = builder.finish(&path.display().to_string())?;
        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok((store, stats))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Look up a track by identifier
    pub fn get(&self, id: &str) -> Option<&TrackRecord> {
        self.positions.get(id).map(|&pos| &self.tracks[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Catalog position of a track
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Track at a catalog position. Panics if out of range.
    pub fn track(&self, position: usize) -> &TrackRecord {
        &self.tracks[position]
    }

    /// All tracks in catalog order
    pub fn tracks(&self) -> &[TrackRecord] {
        &self.tracks
    }

    /// Feature vectors in catalog order
    pub fn vectors(&self) -> impl ExactSizeIterator<Item = &FeatureVector> + Clone + '_ {
        self.tracks.iter().map(|t| &t.features)
    }

    /// Per-feature mean across the whole catalog
    pub fn mean_vector(&self) -> &FeatureVector {
        &self.mean
    }
}

fn sql_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

/// Where the identifier, popularity and feature columns sit in a header row.
#[derive(Debug)]
struct ColumnLayout {
    id_column: usize,
    popularity_column: usize,
    feature_columns: Vec<usize>,
    schema: FeatureSchema,
}

impl ColumnLayout {
    fn resolve(headers: &[String]) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let missing = |column: &'static str| LoadError::MissingColumn {
            column,
            available: headers.to_vec(),
        };

        let id_column = find(ID_COLUMN)
            .or_else(|| find(ID_ALIAS_COLUMN))
            .ok_or_else(|| missing(ID_COLUMN))?;
        let popularity_column = find(POPULARITY_COLUMN).ok_or_else(|| missing(POPULARITY_COLUMN))?;

        let schema = FeatureSchema::from_columns(headers);
        let feature_columns = schema
            .names()
            .iter()
            .filter_map(|name| find(*name))
            .collect();

        debug!("Usable feature columns: {:?}", schema.names());
        Ok(Self {
            id_column,
            popularity_column,
            feature_columns,
            schema,
        })
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accumulates rows into a store while keeping the drop accounting.
struct CatalogBuilder {
    schema: FeatureSchema,
    seen: FxHashSet<String>,
    tracks: Vec<TrackRecord>,
    stats: CatalogStats,
}

impl CatalogBuilder {
    fn new(schema: FeatureSchema) -> Self {
        let stats = CatalogStats {
            feature_columns: schema.names().iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Self {
            schema,
            seen: FxHashSet::default(),
            tracks: Vec::new(),
            stats,
        }
    }

    fn push_row(&mut self, id: &str, popularity: &str, features: &[&str]) {
        self.stats.rows_read += 1;
        if id.is_empty() {
            self.stats.missing_id_dropped += 1;
            return;
        }
        if !self.seen.insert(id.to_string()) {
            self.stats.duplicate_ids_dropped += 1;
            return;
        }
        let Some(popularity) = parse_number(popularity) else {
            self.stats.bad_popularity_dropped += 1;
            return;
        };
        let parsed: Option<FeatureVector> = features.iter().map(|raw| parse_number(raw)).collect();
        let Some(features) = parsed else {
            self.stats.bad_features_dropped += 1;
            return;
        };
        self.tracks.push(TrackRecord::new(id, popularity, features));
    }

    fn push_record(&mut self, record: TrackRecord) {
        self.stats.rows_read += 1;
        if !self.seen.insert(record.id.clone()) {
            self.stats.duplicate_ids_dropped += 1;
            return;
        }
        if !record.popularity.is_finite() {
            self.stats.bad_popularity_dropped += 1;
            return;
        }
        if record.features.len() != self.schema.len()
            || record.features.iter().any(|v| !v.is_finite())
        {
            self.stats.bad_features_dropped += 1;
            return;
        }
        self.tracks.push(record);
    }

    fn finish(self, source: &str) -> Result<(CatalogStore, CatalogStats), LoadError> {
        let CatalogBuilder {
            schema,
            tracks,
            mut stats,
            ..
        } = self;

        if tracks.is_empty() {
            return Err(LoadError::Empty(source.to_string()));
        }

        let positions = tracks
            .iter()
            .enumerate()
            .map(|(pos, t)| (t.id.clone(), pos))
            .collect();
        let mean = mean_of(tracks.iter().map(|t| &t.features), schema.len());

        stats.tracks_kept = tracks.len();
        info!(
            "Catalog loaded from {}: {} tracks, {} features ({} duplicates, {} bad popularity, {} bad features dropped)",
            source,
            stats.tracks_kept,
            schema.len(),
            stats.duplicate_ids_dropped,
            stats.bad_popularity_dropped,
            stats.bad_features_dropped
        );

        Ok((
            CatalogStore {
                schema,
                tracks,
                positions,
                mean,
            },
            stats,
        ))
    }
}

/// Arithmetic mean per feature. Returns zeros for an empty input.
pub fn mean_of<'a>(vectors: impl Iterator<Item = &'a FeatureVector>, dims: usize) -> FeatureVector {
    let mut sum = vec![0.0; dims];
    let mut count = 0usize;
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v) {
            *s += x;
        }
        count += 1;
    }
    if count > 0 {
        for s in sum.iter_mut() {
            *s /= count as f64;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_csv_dedup_keeps_first() {
        let file = write_temp(
            ".csv",
            "id,popularity,energy,valence\n\
             a,50,0.1,0.2\n\
             b,60,0.3,0.4\n\
             a,70,0.9,0.9\n",
        );
        let (store, stats) = CatalogStore::load_csv(file.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(stats.duplicate_ids_dropped, 1);
        let a = store.get("a").unwrap();
        assert_eq!(a.popularity, 50.0);
        assert_eq!(a.features, vec![0.1, 0.2]);
    }

    #[test]
    fn test_csv_ids_kept_verbatim() {
        let file = write_temp(
            ".csv",
            "id,popularity,energy\n\
             \x20a,50,0.1\n\
             a,60,0.2\n",
        );
        let (store, stats) = CatalogStore::load_csv(file.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(stats.duplicate_ids_dropped, 0);
        assert_eq!(store.get(" a").unwrap().popularity, 50.0);
        assert_eq!(store.get("a").unwrap().popularity, 60.0);
    }

    #[test]
    fn test_csv_drops_bad_popularity_after_dedup() {
        // First "a" has garbage popularity: it is dropped and the later
        // duplicate does not replace it.
        let file = write_temp(
            ".csv",
            "track_id,popularity,energy\n\
             a,n/a,0.1\n\
             a,40,0.2\n\
             b,,0.3\n\
             c,35.5,0.4\n",
        );
        let (store, stats) = CatalogStore::load_csv(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some());
        assert_eq!(stats.bad_popularity_dropped, 2);
        assert_eq!(stats.duplicate_ids_dropped, 1);
        assert_eq!(stats.rows_read, 4);
    }

    #[test]
    fn test_csv_feature_columns_intersection() {
        let file = write_temp(
            ".csv",
            "valence,name,id,popularity,tempo,acousticness,key\n\
             0.5,Song,x,80,120,0.3,5\n",
        );
        let (store, stats) = CatalogStore::load_csv(file.path()).unwrap();
        assert_eq!(store.schema().names(), &["acousticness", "tempo", "valence"]);
        assert_eq!(store.get("x").unwrap().features, vec![0.3, 120.0, 0.5]);
        assert_eq!(stats.feature_columns, vec!["acousticness", "tempo", "valence"]);
    }

    #[test]
    fn test_csv_missing_columns() {
        let file = write_temp(".csv", "name,popularity\nfoo,1\n");
        let err = CatalogStore::load_csv(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "track_id", .. }));

        let file = write_temp(".csv", "id,energy\nfoo,1\n");
        let err = CatalogStore::load_csv(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "popularity", .. }));
    }

    #[test]
    fn test_missing_and_empty_dataset() {
        let err = CatalogStore::load_csv(Path::new("/nonexistent/spotify_data.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));

        let file = write_temp(".csv", "id,popularity,energy\n");
        let err = CatalogStore::load_csv(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
    }

    #[test]
    fn test_load_dispatch_by_extension() {
        let file = write_temp(".json", "{}");
        let err = CatalogStore::load(file.path(), DEFAULT_TABLE).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_sqlite_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE tracks (id TEXT, popularity INTEGER, energy REAL, tempo REAL);
                 INSERT INTO tracks VALUES ('a', 45, 0.5, 120.0);
                 INSERT INTO tracks VALUES ('b', NULL, 0.6, 130.0);
                 INSERT INTO tracks VALUES ('c', 10, 0.7, 90);
                 INSERT INTO tracks VALUES ('a', 99, 0.1, 60.0);",
            )
            .unwrap();
        }
        let (store, stats) = CatalogStore::load(&path, DEFAULT_TABLE).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.schema().names(), &["energy", "tempo"]);
        assert_eq!(store.get("c").unwrap().features, vec![0.7, 90.0]);
        assert_eq!(store.get("a").unwrap().popularity, 45.0);
        assert_eq!(stats.bad_popularity_dropped, 1);
        assert_eq!(stats.duplicate_ids_dropped, 1);
    }

    #[test]
    fn test_from_records_unique_ids_and_mean() {
        let schema = FeatureSchema::from_columns(&["energy", "tempo"]);
        let store = CatalogStore::from_records(
            schema,
            vec![
                TrackRecord::new("a", 50.0, vec![0.2, 100.0]),
                TrackRecord::new("b", 50.0, vec![0.4, 140.0]),
                TrackRecord::new("a", 50.0, vec![1.0, 1.0]),
            ],
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        let ids: FxHashSet<&str> = store.tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), store.len());
        let mean = store.mean_vector();
        assert!((mean[0] - 0.3).abs() < 1e-12);
        assert!((mean[1] - 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_records_rejects_wrong_width() {
        let schema = FeatureSchema::from_columns(&["energy"]);
        let err = CatalogStore::from_records(schema, vec![TrackRecord::new("a", 50.0, vec![0.1, 0.2])])
            .unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
    }
}
