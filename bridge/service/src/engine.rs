// Copyright (c) 2024 The Botho Foundation

//! Timeout monitor - watches open locks and reports expiring windows.

use chrono::Utc;
use htlc_bridge_core::{
    ServiceSettings, StoreError, Timestamp, TxKind, TxRecord, TxStatus, TxStore, XHash,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::db::Database;

/// Shutdown signal type.
pub type ShutdownSignal = broadcast::Receiver<()>;

/// Lock states the monitor tracks.
const OPEN_STATES: [TxStatus; 3] = [TxStatus::Locked, TxStatus::AssetLocked, TxStatus::DebtLocked];

/// What happened to an open lock since the previous scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Fewer than `expiry_warning_secs` remain in the redeem window
    ExpiringSoon { left: u64 },
    /// The window closed; the record can now be revoked
    Revocable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub kind: TxKind,
    pub x_hash: XHash,
    pub status: TxStatus,
    pub deadline: Timestamp,
    pub notice: NoticeKind,
}

/// Polls the store for open locks and reports each transition once.
pub struct TimeoutMonitor {
    settings: ServiceSettings,
    db: Database,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: ShutdownSignal,
    warned: HashSet<(TxKind, XHash)>,
    revocable: HashSet<(TxKind, XHash)>,
}

impl TimeoutMonitor {
    pub fn new(settings: ServiceSettings, db: Database) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            settings,
            db,
            shutdown_tx,
            shutdown_rx,
            warned: HashSet::new(),
            revocable: HashSet::new(),
        }
    }

    /// Handle that stops a running monitor.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Scan every open lock at `now` and return the new notices.
    pub fn scan(&mut self, now: Timestamp) -> Result<Vec<ExpiryNotice>, StoreError> {
        let mut notices = Vec::new();
        let mut open = HashSet::new();

        for status in OPEN_STATES {
            for record in self.db.records_with_status(status)? {
                open.insert((record.kind(), record.x_hash));
                if let Some(notice) = self.check(&record, now) {
                    notices.push(notice);
                }
            }
        }

        // Settled records never reopen
        self.warned.retain(|key| open.contains(key));
        self.revocable.retain(|key| open.contains(key));

        for notice in &notices {
            let details = match notice.notice {
                NoticeKind::ExpiringSoon { left } => {
                    warn!(
                        "{} lock {} expires in {}s (deadline {})",
                        notice.kind, notice.x_hash, left, notice.deadline
                    );
                    format!("{} {} left {}s", notice.kind, notice.status, left)
                }
                NoticeKind::Revocable => {
                    info!(
                        "{} lock {} passed its deadline {}, now revocable",
                        notice.kind, notice.x_hash, notice.deadline
                    );
                    format!("{} {} deadline {}", notice.kind, notice.status, notice.deadline)
                }
            };
            let action = match notice.notice {
                NoticeKind::ExpiringSoon { .. } => "expiring",
                NoticeKind::Revocable => "revocable",
            };
            self.db.log_audit(Some(&notice.x_hash), action, &details)?;
        }

        Ok(notices)
    }

    fn check(&mut self, record: &TxRecord, now: Timestamp) -> Option<ExpiryNotice> {
        let key = (record.kind(), record.x_hash);
        let deadline = record.base.deadline();
        let notice = |notice| ExpiryNotice {
            kind: record.kind(),
            x_hash: record.x_hash,
            status: record.base.status,
            deadline,
            notice,
        };

        if record.base.is_expired(now) {
            if self.revocable.insert(key) {
                return Some(notice(NoticeKind::Revocable));
            }
            return None;
        }
        if !record.base.in_redeem_window(now) {
            return None;
        }

        let left = record.base.left_locked_time(now);
        if left <= self.settings.expiry_warning_secs && self.warned.insert(key) {
            return Some(notice(NoticeKind::ExpiringSoon { left }));
        }
        None
    }

    /// Run the monitor until Ctrl-C or a shutdown signal.
    pub async fn run(mut self) -> Result<(), String> {
        info!(
            "Starting timeout monitor (poll every {}s, warn at {}s)",
            self.settings.poll_interval_secs, self.settings.expiry_warning_secs
        );

        let interval = Duration::from_secs(self.settings.poll_interval_secs.max(1));

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Timeout monitor shutting down");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.scan(unix_now()) {
                        error!("Timeout scan error: {}", e);
                    }
                }
            }
        }

        info!("Timeout monitor stopped");
        Ok(())
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> Timestamp {
    Utc::now().timestamp().max(0) as Timestamp
}
