//! `shardstore` demo: hosts contending for shard ownership against one
//! in-memory store.

use anyhow::Context;
use clap::Parser;
use futures::future::try_join_all;
use shardstore::{
    InMemoryShardStore, RangeId, ShardId, ShardManager, ShardRecord, StoreConfig, StoreError,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "shardstore", about = "Simulate hosts contending for shard ownership")]
pub struct Args {
    /// Number of shards to create
    #[arg(long, default_value_t = 4)]
    pub shards: i32,

    /// Number of contending hosts
    #[arg(long, default_value_t = 3)]
    pub hosts: usize,

    /// Ownership rounds per host
    #[arg(long, default_value_t = 5)]
    pub rounds: usize,

    /// Lock wait timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub lock_wait_ms: u64,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    anyhow::ensure!(args.shards > 0, "--shards must be positive");

    let config = StoreConfig::new().lock_wait_timeout(Duration::from_millis(args.lock_wait_ms));
    let retry = config.retry_policy.clone();
    let store = Arc::new(InMemoryShardStore::with_config(config));
    let manager = Arc::new(ShardManager::new(Arc::clone(&store), retry));

    for id in 0..args.shards {
        manager
            .create_shard(&ShardRecord::new(ShardId(id), "", RangeId(0)))
            .await
            .with_context(|| format!("creating shard {}", id))?;
    }

    let tasks = (0..args.hosts).map(|_| {
        let manager = Arc::clone(&manager);
        let host = format!("host-{}", Uuid::new_v4());
        let (shards, rounds) = (args.shards, args.rounds);
        tokio::spawn(async move { work(&manager, &host, shards, rounds).await })
    });
    for outcome in try_join_all(tasks).await? {
        outcome?;
    }

    for id in 0..args.shards {
        let record = manager.get_shard(ShardId(id)).await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    let stats = store.transaction_stats();
    println!(
        "transactions: committed={} aborted={}",
        stats.committed, stats.aborted
    );
    Ok(())
}

/// Each round the host takes every shard, then advances its ack levels under
/// the range id it was granted. Losing that race to another host is expected.
async fn work(
    manager: &ShardManager<InMemoryShardStore>,
    host: &str,
    shards: i32,
    rounds: usize,
) -> shardstore::Result<()> {
    for _ in 0..rounds {
        for id in 0..shards {
            let mut record = manager.acquire_shard(ShardId(id), host).await?;
            let granted = record.range_id;
            record.replication_ack_level += 1;
            record.transfer_ack_level += 1;
            match manager.update_shard(&record, granted).await {
                Ok(()) | Err(StoreError::StaleFencingToken { .. }) => {}
                Err(err) => return Err(err),
            }
            tokio::task::yield_now().await;
        }
    }
    Ok(())
}
