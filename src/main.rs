//! coffer - interactive shell over the storage engine and backup store.

use std::io::{self, BufRead, Write};

use coffer::backup::BackupEngine;
use coffer::config::{Options, RestoreOptions};
use coffer::engine::Coffer;
use coffer::error::CofferError;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(|| "./data".to_string());
    let store_path = args.next().unwrap_or_else(|| "./backups".to_string());

    println!();
    println!("  coffer - embedded KV engine with backup/restore");
    println!("  database: {}   backup store: {}", db_path, store_path);
    println!();
    println!("  Commands:");
    println!("    set <key> <value>  - Store a key-value pair");
    println!("    get <key>          - Retrieve a value by key");
    println!("    del <key>          - Delete a key");
    println!("    scan               - List all key-value pairs");
    println!("    info               - Show engine statistics");
    println!("    backup             - Snapshot the database into the store");
    println!("    backups            - List backups in the store");
    println!("    restore <dir>      - Restore the latest backup into <dir>");
    println!("    exit               - Shutdown");
    println!();

    let mut options = Options::new();
    if let Err(e) = options.set_create_if_missing(true) {
        eprintln!("[ERROR] configuring options: {}", e);
        std::process::exit(1);
    }

    let mut engine = match Coffer::open(&options, &db_path) {
        Ok(e) => e,
        Err(err) => {
            eprintln!("[ERROR] failed to open engine: {}", err);
            std::process::exit(1);
        }
    };
    let mut backups = match BackupEngine::open(&options, &store_path) {
        Ok(b) => b,
        Err(err) => {
            eprintln!("[ERROR] failed to open backup store: {}", err);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("coffer> ");
        stdout.flush().unwrap();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap() == 0 {
            break; // EOF
        }

        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_lowercase().as_str() {
            "set" | "put" => {
                if parts.len() < 3 {
                    println!("  Usage: set <key> <value>");
                    continue;
                }
                let key = parts[1].as_bytes().to_vec();
                let value = parts[2..].join(" ").as_bytes().to_vec();
                match engine.put(key, value) {
                    Ok(()) => println!("  OK"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "get" => {
                if parts.len() < 2 {
                    println!("  Usage: get <key>");
                    continue;
                }
                match engine.get(parts[1].as_bytes()) {
                    Some(value) => match String::from_utf8(value) {
                        Ok(s) => println!("  \"{}\"", s),
                        Err(_) => println!("  <binary data>"),
                    },
                    None => println!("  (nil)"),
                }
            }
            "del" | "delete" => {
                if parts.len() < 2 {
                    println!("  Usage: del <key>");
                    continue;
                }
                match engine.delete(parts[1].as_bytes().to_vec()) {
                    Ok(()) => println!("  OK (deleted)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "scan" | "list" => {
                let entries = engine.scan();
                if entries.is_empty() {
                    println!("  (empty)");
                } else {
                    for (key, value) in &entries {
                        let k = String::from_utf8_lossy(key);
                        let v = String::from_utf8_lossy(value);
                        println!("  {} -> {}", k, v);
                    }
                    println!("  ({} entries)", entries.len());
                }
            }
            "info" | "stats" => {
                println!("  Entries:       {}", engine.len());
                println!("  MemTable size: {} bytes", engine.memtable_size());
                println!("  Tablets:       {}", engine.tablet_paths().len());
            }
            "backup" => match backups.create_new_backup(&mut engine) {
                Ok(id) => println!("  OK (backup {})", id),
                Err(e) => println!("  ERROR: {}", e),
            },
            "backups" => match backups.get_backup_info() {
                Ok(mut info) => {
                    let count = info.count().unwrap_or(0);
                    if count == 0 {
                        println!("  (no backups)");
                    }
                    for i in 0..count {
                        println!(
                            "  #{} id={} time={} size={} files={}",
                            i,
                            info.backup_id(i).unwrap_or(0),
                            info.timestamp(i).unwrap_or(0),
                            info.size_bytes(i).unwrap_or(0),
                            info.file_count(i).unwrap_or(0),
                        );
                    }
                    let _ = info.destroy();
                }
                Err(e) => println!("  ERROR: {}", e),
            },
            "restore" => {
                if parts.len() < 2 {
                    println!("  Usage: restore <dir>");
                    continue;
                }
                let target = parts[1];
                let mut restore_opts = RestoreOptions::new();
                match backups.restore_from_latest_backup(target, target, &restore_opts) {
                    Ok(()) => println!("  OK (restored into {})", target),
                    Err(CofferError::NotFound) => println!("  ERROR: the store has no backups"),
                    Err(e) => println!("  ERROR: {}", e),
                }
                let _ = restore_opts.close();
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down coffer...");
                break;
            }
            _ => {
                println!("  Unknown command: '{}'. Type 'exit' to quit.", parts[0]);
            }
        }
    }

    if let Err(e) = backups.close() {
        eprintln!("[ERROR] closing backup store: {}", e);
    }
    if let Err(e) = options.close() {
        eprintln!("[ERROR] closing options: {}", e);
    }
}
