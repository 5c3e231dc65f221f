// Copyright (c) 2024 The Botho Foundation

//! SQLite persistence for HTLC records and the Rapidity guard.

use chrono::Utc;
use htlc_bridge_core::{
    BaseTx, CustodianId, StoreError, Timestamp, TxKind, TxPayload, TxRecord, TxStatus, TxStore,
    UniqueId, XHash,
};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// One line of a record's audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: String,
    pub details: String,
    pub created_at: i64,
}

const RECORD_COLUMNS: &str =
    "kind, x_hash, custodian_id, locked_time, begin_locked_time, status, payload";

fn backend(context: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |e| StoreError::Backend(format!("{}: {}", context, e))
}

impl Database {
    /// Open or create the database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend("Failed to open database"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(backend("Failed to open in-memory database"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run database migrations.
    pub fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS htlc_txs (
                kind TEXT NOT NULL,
                x_hash TEXT NOT NULL,
                custodian_id TEXT NOT NULL,
                locked_time INTEGER NOT NULL,
                begin_locked_time INTEGER NOT NULL,
                status TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (kind, x_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_htlc_status ON htlc_txs(status);
            CREATE INDEX IF NOT EXISTS idx_htlc_hash ON htlc_txs(x_hash);

            CREATE TABLE IF NOT EXISTS rapidity_txs (
                unique_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                consumed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                x_hash TEXT,
                action TEXT NOT NULL,
                details TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_hash ON audit_log(x_hash);
            CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_log(created_at);
            "#,
        )
        .map_err(backend("Migration failed"))?;

        Ok(())
    }

    /// Log an audit event.
    pub fn log_audit(
        &self,
        x_hash: Option<&XHash>,
        action: &str,
        details: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_audit(&conn, x_hash, action, details)
    }

    /// Audit trail of `x_hash`, oldest first.
    pub fn audit_trail(&self, x_hash: &XHash) -> Result<Vec<AuditEntry>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT action, details, created_at FROM audit_log
                WHERE x_hash = ?1 ORDER BY id ASC
                "#,
            )
            .map_err(backend("Prepare failed"))?;

        let entries = stmt
            .query_map(params![x_hash.to_hex()], |row| {
                Ok(AuditEntry {
                    action: row.get(0)?,
                    details: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    created_at: row.get(2)?,
                })
            })
            .map_err(backend("Query failed"))?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(backend("Collect failed"))?;

        Ok(entries)
    }

    /// Convert a database row to a TxRecord.
    fn row_to_record(row: &rusqlite::Row<'_>) -> SqliteResult<Result<TxRecord, StoreError>> {
        let kind: String = row.get(0)?;
        let x_hash: String = row.get(1)?;
        let custodian_id: String = row.get(2)?;
        let locked_time: i64 = row.get(3)?;
        let begin_locked_time: i64 = row.get(4)?;
        let status: String = row.get(5)?;
        let payload: String = row.get(6)?;

        Ok(decode_record(
            &kind,
            &x_hash,
            &custodian_id,
            locked_time,
            begin_locked_time,
            &status,
            &payload,
        ))
    }
}

fn decode_record(
    kind: &str,
    x_hash: &str,
    custodian_id: &str,
    locked_time: i64,
    begin_locked_time: i64,
    status: &str,
    payload: &str,
) -> Result<TxRecord, StoreError> {
    let corrupt =
        |what: &str, e: String| StoreError::Corrupt(format!("{} {}: {}", what, x_hash, e));

    let kind: TxKind = kind.parse().map_err(|e| corrupt("kind of", e))?;
    let payload: TxPayload =
        serde_json::from_str(payload).map_err(|e| corrupt("payload of", e.to_string()))?;
    if payload.kind() != kind {
        return Err(corrupt("payload kind of", payload.kind().to_string()));
    }

    Ok(TxRecord {
        x_hash: x_hash
            .parse::<XHash>()
            .map_err(|e| corrupt("hash", e.to_string()))?,
        base: BaseTx {
            custodian_id: custodian_id
                .parse::<CustodianId>()
                .map_err(|e| corrupt("custodian of", e.to_string()))?,
            // Stored as the two's-complement bit pattern of the u64
            locked_time: locked_time as u64,
            begin_locked_time: begin_locked_time as u64,
            status: status.parse().map_err(|e| corrupt("status of", e))?,
        },
        payload,
    })
}

fn insert_audit(
    conn: &Connection,
    x_hash: Option<&XHash>,
    action: &str,
    details: &str,
) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO audit_log (x_hash, action, details, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            x_hash.map(|h| h.to_hex()),
            action,
            details,
            Utc::now().timestamp()
        ],
    )
    .map_err(backend("Audit insert failed"))?;

    Ok(())
}

impl TxStore for Database {
    fn get(&self, kind: TxKind, x_hash: &XHash) -> Result<Option<TxRecord>, StoreError> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} FROM htlc_txs WHERE kind = ?1 AND x_hash = ?2",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(backend("Prepare failed"))?;

        let result = stmt
            .query_row(params![kind.to_string(), x_hash.to_hex()], |row| {
                Self::row_to_record(row)
            })
            .optional()
            .map_err(backend("Query failed"))?;

        result.transpose()
    }

    fn insert(&self, record: &TxRecord) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;

        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| StoreError::Backend(format!("Payload encoding failed: {}", e)))?;
        // The row and its audit entry commit together or not at all
        let tx = conn
            .transaction()
            .map_err(backend("Transaction failed"))?;
        let changed = tx
            .execute(
                r#"
                INSERT OR IGNORE INTO htlc_txs (
                    kind, x_hash, custodian_id, locked_time, begin_locked_time,
                    status, payload, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    record.kind().to_string(),
                    record.x_hash.to_hex(),
                    record.base.custodian_id.to_hex(),
                    record.base.locked_time as i64,
                    record.base.begin_locked_time as i64,
                    record.base.status.to_string(),
                    payload,
                    Utc::now().timestamp(),
                ],
            )
            .map_err(backend("Insert failed"))?;

        if changed == 1 {
            insert_audit(
                &tx,
                Some(&record.x_hash),
                "created",
                &format!("{} {}", record.kind(), record.base.status),
            )?;
        }
        tx.commit().map_err(backend("Commit failed"))?;
        Ok(changed == 1)
    }

    fn compare_and_set_status(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        current: TxStatus,
        next: TxStatus,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;

        let tx = conn
            .transaction()
            .map_err(backend("Transaction failed"))?;
        let changed = tx
            .execute(
                r#"
                UPDATE htlc_txs SET status = ?1, updated_at = ?2
                WHERE kind = ?3 AND x_hash = ?4 AND status = ?5
                "#,
                params![
                    next.to_string(),
                    Utc::now().timestamp(),
                    kind.to_string(),
                    x_hash.to_hex(),
                    current.to_string(),
                ],
            )
            .map_err(backend("Update failed"))?;

        if changed == 1 {
            insert_audit(
                &tx,
                Some(x_hash),
                &next.to_string(),
                &format!("{} {} -> {}", kind, current, next),
            )?;
        }
        tx.commit().map_err(backend("Commit failed"))?;
        Ok(changed == 1)
    }

    fn records_with_status(&self, status: TxStatus) -> Result<Vec<TxRecord>, StoreError> {
        let conn = self.lock()?;

        let sql = format!("SELECT {} FROM htlc_txs WHERE status = ?1", RECORD_COLUMNS);
        let mut stmt = conn.prepare(&sql).map_err(backend("Prepare failed"))?;

        let mut records = stmt
            .query_map(params![status.to_string()], |row| Self::row_to_record(row))
            .map_err(backend("Query failed"))?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(backend("Collect failed"))?
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        // Sorted here: begin times above i64::MAX read back negative in SQL
        records.sort_by_key(|r| (r.base.begin_locked_time, r.kind(), r.x_hash));
        Ok(records)
    }

    fn rapidity_status(&self, unique_id: &UniqueId) -> Result<TxStatus, StoreError> {
        let conn = self.lock()?;

        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM rapidity_txs WHERE unique_id = ?1",
                params![unique_id.to_hex()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend("Query failed"))?;

        match status {
            Some(s) => s
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("rapidity {}: {}", unique_id, e))),
            None => Ok(TxStatus::None),
        }
    }

    fn insert_rapidity(&self, unique_id: &UniqueId, at: Timestamp) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let changed = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO rapidity_txs (unique_id, status, consumed_at)
                VALUES (?1, ?2, ?3)
                "#,
                params![unique_id.to_hex(), TxStatus::Redeemed.to_string(), at as i64],
            )
            .map_err(backend("Insert failed"))?;

        Ok(changed == 1)
    }
}

// Extension trait for rusqlite optional queries
trait OptionalExt<T> {
    fn optional(self) -> SqliteResult<Option<T>>;
}

impl<T> OptionalExt<T> for SqliteResult<T> {
    fn optional(self) -> SqliteResult<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htlc_bridge_core::{
        AddDebtTx, AddUserTx, Address, HtlcLedger, RapidityGuard, Secret, SmgTx, UserTx,
    };

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn user_record(seed: u8, begin: u64) -> TxRecord {
        TxRecord::new(
            Secret::new([seed; 32]).x_hash(),
            CustodianId::new([0x11; 32]),
            3_600,
            TxStatus::Locked,
            begin,
            TxPayload::User(UserTx {
                token_pair_id: 7,
                value: u128::MAX,
                fee: 5,
                user_account: Address::new([0xaa; 20]),
            }),
        )
    }

    #[test]
    fn test_record_roundtrip_and_cas() {
        let db = db();
        let record = user_record(1, 100);

        assert!(db.insert(&record).unwrap());
        assert!(!db.insert(&record).unwrap());
        assert_eq!(db.get(TxKind::User, &record.x_hash).unwrap(), Some(record));
        assert_eq!(db.get(TxKind::Smg, &record.x_hash).unwrap(), None);

        assert!(db
            .compare_and_set_status(TxKind::User, &record.x_hash, TxStatus::Locked, TxStatus::Redeemed)
            .unwrap());
        assert!(!db
            .compare_and_set_status(TxKind::User, &record.x_hash, TxStatus::Locked, TxStatus::Revoked)
            .unwrap());

        let stored = db.get(TxKind::User, &record.x_hash).unwrap().unwrap();
        assert_eq!(stored.base.status, TxStatus::Redeemed);

        let trail = db.audit_trail(&record.x_hash).unwrap();
        let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["created", "redeemed"]);
    }

    #[test]
    fn test_namespaces_share_hash() {
        let db = db();
        let user = user_record(2, 0);
        let smg = TxRecord::new(
            user.x_hash,
            CustodianId::new([0x11; 32]),
            60,
            TxStatus::Locked,
            5,
            TxPayload::Smg(SmgTx {
                token_pair_id: 7,
                value: 1,
                user_account: Address::new([0xbb; 20]),
            }),
        );

        assert!(db.insert(&user).unwrap());
        assert!(db.insert(&smg).unwrap());
        assert_eq!(db.records_with_status(TxStatus::Locked).unwrap(), vec![user, smg]);
    }

    #[test]
    fn test_large_timestamps_survive() {
        let db = db();
        let record = user_record(3, u64::MAX - 1);

        db.insert(&record).unwrap();
        let stored = db.get(TxKind::User, &record.x_hash).unwrap().unwrap();
        assert_eq!(stored.base.begin_locked_time, u64::MAX - 1);
        assert_eq!(stored.base.deadline(), u64::MAX);
    }

    #[test]
    fn test_ledger_over_database() {
        let htlc = HtlcLedger::new(db());
        let x = Secret::new([4; 32]);

        htlc.add_user_tx(
            &AddUserTx {
                x_hash: x.x_hash(),
                custodian_id: CustodianId::new([0x11; 32]),
                token_pair_id: 1,
                value: 10,
                fee: 0,
                locked_time: 100,
            },
            Address::new([0xaa; 20]),
            0,
        )
        .unwrap();
        htlc.add_debt_tx(
            &AddDebtTx {
                x_hash: x.x_hash(),
                src_custodian_id: CustodianId::new([0x11; 32]),
                dest_custodian_id: CustodianId::new([0x22; 32]),
                locked_time: 10,
                status: TxStatus::DebtLocked,
            },
            0,
        )
        .unwrap();

        htlc.redeem_user_tx(&x, 50).unwrap();
        htlc.revoke_debt_tx(&x.x_hash(), TxStatus::DebtLocked, 10).unwrap();
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Redeemed);
        assert_eq!(htlc.status_of(TxKind::Debt, &x.x_hash()).unwrap(), TxStatus::Revoked);
        assert_eq!(htlc.get_left_locked_time(&x.x_hash(), 60).unwrap(), 40);
    }

    #[test]
    fn test_failed_audit_rolls_back_write() {
        let db = db();
        let kept = user_record(6, 0);
        db.insert(&kept).unwrap();
        db.lock().unwrap().execute_batch("DROP TABLE audit_log").unwrap();

        let fresh = user_record(7, 0);
        assert!(db.insert(&fresh).is_err());
        assert_eq!(db.get(TxKind::User, &fresh.x_hash).unwrap(), None);

        assert!(db
            .compare_and_set_status(TxKind::User, &kept.x_hash, TxStatus::Locked, TxStatus::Redeemed)
            .is_err());
        let stored = db.get(TxKind::User, &kept.x_hash).unwrap().unwrap();
        assert_eq!(stored.base.status, TxStatus::Locked);
    }

    #[test]
    fn test_failed_audit_keeps_ledger_locked() {
        let db = db();
        let htlc = HtlcLedger::new(db.clone());
        let x = Secret::new([8; 32]);
        let add = |x: &Secret| AddUserTx {
            x_hash: x.x_hash(),
            custodian_id: CustodianId::new([0x11; 32]),
            token_pair_id: 1,
            value: 10,
            fee: 0,
            locked_time: 100,
        };

        htlc.add_user_tx(&add(&x), Address::new([0xaa; 20]), 0).unwrap();
        db.lock().unwrap().execute_batch("DROP TABLE audit_log").unwrap();

        assert!(htlc.redeem_user_tx(&x, 50).is_err());
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Locked);

        let other = Secret::new([9; 32]);
        assert!(htlc.add_user_tx(&add(&other), Address::new([0xaa; 20]), 0).is_err());
        assert_eq!(htlc.status_of(TxKind::User, &other.x_hash()).unwrap(), TxStatus::None);
    }

    #[test]
    fn test_rapidity_table() {
        let db = db();
        let guard = RapidityGuard::new(db.clone());
        let id = UniqueId::new([9; 32]);

        assert_eq!(db.rapidity_status(&id).unwrap(), TxStatus::None);
        guard.add_rapidity_tx(&id, 1).unwrap();
        assert_eq!(db.rapidity_status(&id).unwrap(), TxStatus::Redeemed);
        assert!(guard.add_rapidity_tx(&id, 2).is_err());
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("htlc.db");
        let path = path.to_str().unwrap();
        let record = user_record(5, 10);

        {
            let db = Database::open(path).unwrap();
            db.migrate().unwrap();
            db.insert(&record).unwrap();
            db.log_audit(None, "startup", "test").unwrap();
        }

        let db = Database::open(path).unwrap();
        db.migrate().unwrap();
        assert_eq!(db.get(TxKind::User, &record.x_hash).unwrap(), Some(record));
    }
}
