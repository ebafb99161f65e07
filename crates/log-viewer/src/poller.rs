//! Poll loop (spec §4.4): for each watched file, stat for rotation
//! (inode change resets the cursor to 0), read from the persisted offset
//! in bounded chunks, parse each Docker JSON-log line, feed the line into
//! the per-container reassembler, and persist the cursor after each
//! batch is committed.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::cursor::{self, Cursor};
use crate::discovery::{scan_sources, WatchedFile};
use crate::reassembler::Reassembler;
use crate::store::{insert_batch, NewLogRow};
use crate::tail::TailRegistry;

const READ_CHUNK_BYTES: u64 = 1_000_000;

#[derive(serde::Deserialize)]
struct DockerLogLine {
    log: String,
    stream: String,
    time: String,
}

pub struct PollerConfig {
    pub log_sources: String,
    pub containers: Vec<String>,
    pub poll_interval: Duration,
    pub max_entries: i64,
}

/// Run the poll loop forever, re-scanning `log_sources` on every tick so
/// containers that appear after startup are picked up.
pub async fn run_forever(pool: SqlitePool, registry: TailRegistry, cfg: PollerConfig) {
    let mut reassemblers: HashMap<String, Reassembler> = HashMap::new();
    loop {
        let files = scan_sources(&cfg.log_sources, &cfg.containers);
        for file in &files {
            if let Err(err) = poll_one(&pool, &registry, file, &mut reassemblers, cfg.max_entries).await {
                tracing::warn!(container = %file.container_name, error = %err, "log poll failed");
            }
        }
        tokio::time::sleep(cfg.poll_interval).await;
    }
}

async fn poll_one(
    pool: &SqlitePool,
    registry: &TailRegistry,
    file: &WatchedFile,
    reassemblers: &mut HashMap<String, Reassembler>,
    max_entries: i64,
) -> anyhow::Result<()> {
    let path_str = file.path.to_string_lossy().to_string();
    let metadata = std::fs::metadata(&file.path)?;
    let current_inode = metadata.ino() as i64;

    let stored = cursor::load(pool, &file.container_id, &path_str).await?;
    let mut position = match &stored {
        Some(c) if c.inode == current_inode => c.position,
        Some(_) => 0,
        None => metadata.len() as i64,
    };

    let mut handle = File::open(&file.path)?;
    handle.seek(SeekFrom::Start(position as u64))?;
    let limited = handle.take(READ_CHUNK_BYTES);
    let reader = BufReader::new(limited);

    let reassembler = reassemblers
        .entry(file.container_id.clone())
        .or_insert_with(Reassembler::new);

    let mut batch = Vec::new();
    let mut bytes_read: u64 = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        bytes_read += line.len() as u64 + 1;
        let parsed: DockerLogLine = match serde_json::from_str(&line) {
            Ok(p) => p,
            Err(_) => continue,
        };
        let raw_line = parsed.log.trim_end_matches('\n').to_string();
        if let Some(finalized) = reassembler.feed(&raw_line, &parsed.stream) {
            batch.push(NewLogRow {
                timestamp: parsed.time.clone(),
                container: file.container_name.clone(),
                stream: parsed.stream.clone(),
                level: finalized.level,
                message: finalized.message,
                raw: line.clone(),
            });
        }
    }
    if let Some(finalized) = reassembler.flush_stale() {
        batch.push(NewLogRow {
            timestamp: chrono::Utc::now().to_rfc3339(),
            container: file.container_name.clone(),
            stream: "stdout".to_string(),
            level: finalized.level,
            message: finalized.message,
            raw: String::new(),
        });
    }

    position += bytes_read as i64;

    if !batch.is_empty() {
        insert_batch(pool, &batch, max_entries, registry).await?;
    }
    cursor::persist(
        pool,
        &file.container_id,
        &path_str,
        Cursor { position, inode: current_inode },
    )
    .await?;
    Ok(())
}
