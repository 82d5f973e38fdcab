//! DuckDB storage for the pharmacy directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use duckdb::{Connection, OptionalExt, params};
use pharmadir_core::{Candidate, Pharmacy, PharmacyPatch, merge};
use tracing::{info, warn};

use crate::query::{ListQuery, Page, Pagination, Stats};
use crate::reconcile::{PharmacyRepo, reconcile};
use crate::StoreError;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS pharmacies_id_seq START 1;
CREATE TABLE IF NOT EXISTS pharmacies (
    id         BIGINT    NOT NULL DEFAULT nextval('pharmacies_id_seq'),
    name       VARCHAR   NOT NULL,
    address    VARCHAR   NOT NULL,
    latitude   DOUBLE,
    longitude  DOUBLE,
    phone      VARCHAR,
    email      VARCHAR,
    hours      VARCHAR,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS pharmacies_name_idx ON pharmacies (name);
";

/// Timestamps leave DuckDB as epoch microseconds so they convert losslessly.
const COLUMNS: &str = "id, name, address, latitude, longitude, phone, email, hours, \
                       epoch_us(created_at), epoch_us(updated_at)";

/// DuckDB store holding the single `pharmacies` table.
///
/// Ids come from `pharmacies_id_seq`; `name` is indexed but not unique, and
/// lookups by name take the lowest id as authoritative.
///
/// Use [`open`](Self::open) for an in-memory store and
/// [`open_persistent`](Self::open_persistent) for a file that survives restarts.
pub struct DuckStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl DuckStore {
    /// Open an in-memory database with the schema in place.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    /// Open or create a persistent database at `path`.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let store = Self { conn, path };
        info!(
            path = ?store.path,
            count = store.count()?,
            "opened pharmacy store"
        );
        Ok(store)
    }

    // ── Lookups ──

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM pharmacies", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Pharmacy>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM pharmacies WHERE id = ?");
        let raw = self
            .conn
            .query_row(&sql, params![id], RawPharmacy::from_row)
            .optional()?;
        raw.map(RawPharmacy::into_pharmacy).transpose()
    }

    /// Like [`find_by_id`](Self::find_by_id) but absent rows are an error.
    pub fn get(&self, id: i64) -> Result<Pharmacy, StoreError> {
        self.find_by_id(id)?.ok_or(StoreError::NotFound(id))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Pharmacy>, StoreError> {
        self.conn.find_by_name(name)
    }

    // ── Listings ──

    /// One page of all pharmacies in the requested order. Ties break by id.
    pub fn list(&self, query: &ListQuery) -> Result<Page<Pharmacy>, StoreError> {
        let total = self.count()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM pharmacies ORDER BY {} {}, id ASC LIMIT {} OFFSET {}",
            query.sort.column(),
            query.order.keyword(),
            query.per_page,
            query.offset(),
        );
        let items = self.select(&sql, [])?;
        Ok(Page {
            items,
            pagination: Pagination::new(query.page, query.per_page, total),
        })
    }

    /// Case-insensitive substring search over name and address, ordered by name.
    pub fn search(&self, term: &str, page: u32, per_page: u32) -> Result<Page<Pharmacy>, StoreError> {
        const FILTER: &str =
            "contains(lower(name), lower(?)) OR contains(lower(address), lower(?))";

        let total: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM pharmacies WHERE {FILTER}"),
            params![term, term],
            |row| row.get(0),
        )?;
        let query = ListQuery {
            page,
            per_page,
            ..Default::default()
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM pharmacies WHERE {FILTER} \
             ORDER BY name ASC, id ASC LIMIT {} OFFSET {}",
            query.per_page,
            query.offset(),
        );
        let items = self.select(&sql, params![term, term])?;
        Ok(Page {
            items,
            pagination: Pagination::new(page, per_page, total as usize),
        })
    }

    fn select<P: duckdb::Params>(&self, sql: &str, params: P) -> Result<Vec<Pharmacy>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map(params, RawPharmacy::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawPharmacy::into_pharmacy).collect()
    }

    // ── Mutations ──

    /// Apply a partial patch to one row and return the updated entity.
    pub fn update_by_id(&mut self, id: i64, patch: &PharmacyPatch) -> Result<Pharmacy, StoreError> {
        let mut pharmacy = self.get(id)?;
        merge(&mut pharmacy, patch, now());
        self.conn.update(&pharmacy)?;
        info!(id, name = %pharmacy.name, "pharmacy updated");
        Ok(pharmacy)
    }

    /// Delete one row and return what it held.
    pub fn delete_by_id(&mut self, id: i64) -> Result<Pharmacy, StoreError> {
        let pharmacy = self.get(id)?;
        self.conn
            .execute("DELETE FROM pharmacies WHERE id = ?", params![id])?;
        info!(id, name = %pharmacy.name, "pharmacy deleted");
        Ok(pharmacy)
    }

    /// Run `f` inside a transaction. `Ok` commits; `Err` rolls everything back.
    pub fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    warn!(error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Reconcile a batch of candidates in one transaction, stamped with the
    /// current time. Returns the number of candidates processed.
    pub fn reconcile(&mut self, candidates: &[Candidate]) -> Result<usize, StoreError> {
        self.reconcile_at(candidates, now())
    }

    /// [`reconcile`](Self::reconcile) with an explicit timestamp.
    pub fn reconcile_at(
        &mut self,
        candidates: &[Candidate],
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let now = now.trunc_subsecs(6);
        match self.in_transaction(|conn| reconcile(conn, candidates, now)) {
            Ok(saved) => {
                info!(saved, "reconciled batch committed");
                Ok(saved)
            }
            Err(e) => {
                warn!(error = %e, batch = candidates.len(), "reconciliation rolled back");
                Err(e)
            }
        }
    }

    // ── Aggregates ──

    pub fn stats(&self) -> Result<Stats, StoreError> {
        let (total, with_coords, with_phone, with_email, last_us): (i64, i64, i64, i64, Option<i64>) =
            self.conn.query_row(
                "SELECT count(*),
                        count(*) FILTER (WHERE latitude IS NOT NULL AND longitude IS NOT NULL),
                        count(phone),
                        count(email),
                        epoch_us(max(updated_at))
                 FROM pharmacies",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        let last_update = last_us
            .map(|us| from_micros("updated_at", us))
            .transpose()?;

        Ok(Stats {
            total_pharmacies: total as usize,
            with_coordinates: with_coords as usize,
            with_phone: with_phone as usize,
            with_email: with_email as usize,
            last_update,
            database_size_mb: self.size_mb(),
        })
    }

    /// On-disk size in MiB, two decimals. Zero for in-memory stores.
    fn size_mb(&self) -> f64 {
        let bytes = self
            .path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());
        (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn from_micros(column: &'static str, micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros).ok_or(StoreError::Timestamp { column, micros })
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// A row as DuckDB hands it back, before timestamp conversion.
struct RawPharmacy {
    id: i64,
    name: String,
    address: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    phone: Option<String>,
    email: Option<String>,
    hours: Option<String>,
    created_us: i64,
    updated_us: i64,
}

impl RawPharmacy {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
            hours: row.get(7)?,
            created_us: row.get(8)?,
            updated_us: row.get(9)?,
        })
    }

    fn into_pharmacy(self) -> Result<Pharmacy, StoreError> {
        Ok(Pharmacy {
            id: self.id,
            name: self.name,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            phone: self.phone,
            email: self.email,
            hours: self.hours,
            created_at: from_micros("created_at", self.created_us)?,
            updated_at: from_micros("updated_at", self.updated_us)?,
        })
    }
}

impl PharmacyRepo for Connection {
    fn find_by_name(&self, name: &str) -> Result<Option<Pharmacy>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM pharmacies WHERE name = ? ORDER BY id LIMIT 1");
        let raw = self
            .query_row(&sql, params![name], RawPharmacy::from_row)
            .optional()?;
        raw.map(RawPharmacy::into_pharmacy).transpose()
    }

    fn insert(&self, candidate: &Candidate, now: DateTime<Utc>) -> Result<Pharmacy, StoreError> {
        let id: i64 = self.query_row("SELECT nextval('pharmacies_id_seq')", [], |row| row.get(0))?;
        let pharmacy = Pharmacy::from_candidate(id, candidate, now);
        self.execute(
            "INSERT INTO pharmacies
                (id, name, address, latitude, longitude, phone, email, hours, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, make_timestamp(?::BIGINT), make_timestamp(?::BIGINT))",
            params![
                pharmacy.id,
                pharmacy.name,
                pharmacy.address,
                pharmacy.latitude,
                pharmacy.longitude,
                pharmacy.phone,
                pharmacy.email,
                pharmacy.hours,
                to_micros(pharmacy.created_at),
                to_micros(pharmacy.updated_at),
            ],
        )?;
        Ok(pharmacy)
    }

    fn update(&self, pharmacy: &Pharmacy) -> Result<(), StoreError> {
        // `name` is indexed; only rewrite it when it actually changed.
        let stored: Option<String> = self
            .query_row(
                "SELECT name FROM pharmacies WHERE id = ?",
                params![pharmacy.id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            return Err(StoreError::NotFound(pharmacy.id));
        };
        if stored != pharmacy.name {
            self.execute(
                "UPDATE pharmacies SET name = ? WHERE id = ?",
                params![pharmacy.name, pharmacy.id],
            )?;
        }
        self.execute(
            "UPDATE pharmacies
             SET address = ?, latitude = ?, longitude = ?, phone = ?, email = ?, hours = ?,
                 updated_at = make_timestamp(?::BIGINT)
             WHERE id = ?",
            params![
                pharmacy.address,
                pharmacy.latitude,
                pharmacy.longitude,
                pharmacy.phone,
                pharmacy.email,
                pharmacy.hours,
                to_micros(pharmacy.updated_at),
                pharmacy.id,
            ],
        )?;
        Ok(())
    }
}
