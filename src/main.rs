//! Memo Task demo
//!
//! Memoizes a slow simulated lookup and logs how calls are served.
//!
//! # Environment
//! - `RUST_LOG` - log filter (default: `memo_task=info`)
//! - `MEMO_MAX_AGE`, `MEMO_DEBUG`, `MEMO_PERSIST_DIR`, `MEMO_TIMER_LIMIT` - cache defaults, see [`DefaultConfig::from_env`]

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_task::{CacheContext, CacheHandler, CacheOptions, DefaultConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

/// Stands in for an expensive remote call.
async fn fetch_user((id,): (u32,)) -> Result<User, String> {
    info!(id, "Fetching user from the slow backend");
    tokio::time::sleep(Duration::from_millis(200)).await;
    if id == 0 {
        return Err("user 0 does not exist".to_string());
    }
    Ok(User {
        id,
        name: format!("user-{}", id),
    })
}

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Read cache defaults from the environment
/// 3. Issue duplicate concurrent calls, a repeat call and a failing call
/// 4. Log the resulting statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_task=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ctx = CacheContext::global();
    let defaults: DefaultConfig = ctx.defaults();
    info!(
        max_age = ?defaults.max_age,
        debug = defaults.debug,
        media = ?defaults.persist_media,
        "Cache defaults loaded"
    );

    let users = CacheHandler::new(
        fetch_user,
        CacheOptions::new()
            .max_age(Duration::from_secs(30))
            .persist("demo-users"),
    );
    info!(slot = ?users.persist_slot(), "Handler ready");

    // Both calls share one backend fetch
    let (a, b) = tokio::join!(users.invoke((7,)), users.invoke((7,)));
    let a = a.map_err(anyhow::Error::msg).context("first concurrent call")?;
    let b = b.map_err(anyhow::Error::msg).context("second concurrent call")?;
    info!(?a, ?b, "Concurrent calls resolved");

    let again = users.invoke((7,)).await.map_err(anyhow::Error::msg)?;
    info!(?again, "Repeat call served from cache");

    if let Err(e) = users.invoke((0,)).await {
        info!(error = %e, cached = users.has(users.get_cache_key(&(0,)).as_deref()), "Failure was not cached");
    }

    let stats = users.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        joins = stats.joins,
        rejections = stats.rejections,
        hit_rate = stats.hit_rate(),
        "Cache statistics"
    );

    Ok(())
}
