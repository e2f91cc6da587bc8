//! coffer - configuration and backup/restore layer for an embedded
//! LSM key-value engine.
//!
//! ## Features
//! - **Typed configuration objects**: Options, ReadOptions, WriteOptions,
//!   RestoreOptions and a shared Env, all with explicit create/close
//!   lifecycles and use-after-close detection
//! - **Storage engine**: WAL + memtable + immutable tablets with CRC32
//!   integrity checks and crash recovery
//! - **Backup engine**: point-in-time snapshots of a live database into an
//!   append-only backup store, enumeration, and restore from the latest or
//!   a specific backup
//!
//! ## Example
//! ```no_run
//! use coffer::backup::BackupEngine;
//! use coffer::config::{Options, RestoreOptions};
//! use coffer::engine::Coffer;
//!
//! let mut opts = Options::new();
//! opts.set_create_if_missing(true).unwrap();
//!
//! let mut db = Coffer::open(&opts, "./db").unwrap();
//! db.put(b"key".to_vec(), b"value".to_vec()).unwrap();
//!
//! let mut backups = BackupEngine::open(&opts, "./backups").unwrap();
//! backups.create_new_backup(&mut db).unwrap();
//!
//! let restore_opts = RestoreOptions::new();
//! backups
//!     .restore_from_latest_backup("./db2", "./db2", &restore_opts)
//!     .unwrap();
//! ```

pub mod backup;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod handle;
pub mod types;
