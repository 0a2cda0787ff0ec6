//! Reactive Cache - demo driver
//!
//! Exercises a paged cache end to end against a simulated remote feed:
//! lazy loading shared between subscribers, fan-out of item edits, and an
//! optimistic update that gets rolled back.

use std::time::Duration;

use anyhow::{anyhow, Context};
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reactive_cache::{spawn_trim_task, Config, PagedCache, StreamOptions};

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Post {
    id: u64,
    title: String,
    favorite: bool,
}

/// Stands in for an HTTP fetch of one feed page.
async fn fetch_feed(page: usize) -> anyhow::Result<Vec<Post>> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok((0..3)
        .map(|n| {
            let id = (page * 3 + n) as u64;
            Post {
                id,
                title: format!("Post #{id}"),
                favorite: false,
            }
        })
        .collect())
}

/// Stands in for the server rejecting a write.
async fn save_favorite(id: u64) -> anyhow::Result<()> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    Err(anyhow!("server rejected favorite for post {id}"))
}

fn loader(page: usize) -> StreamOptions<Vec<Post>> {
    StreamOptions::new().if_absent(move || fetch_feed(page))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reactive_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: size={:?}, max_age={:?}, page_size={}, trim_interval={}s",
        config.cache.size, config.cache.max_age, config.page_size, config.trim_interval
    );

    let feed: PagedCache<usize, u64, Post> = PagedCache::new(config.paged(), |post: &Post| post.id);
    let trim_handle = spawn_trim_task(feed.clone(), config.trim_interval);

    // Two screens open the same page: one fetch serves both
    let mut home = feed.stream(0, loader(0));
    let mut detail = feed.stream(0, loader(0));
    let first = home
        .next()
        .await
        .context("feed stream ended")?
        .context("feed load failed")?;
    detail.next().await.context("detail stream ended")??;
    info!("Loaded page 0 with {} posts", first.len());

    // Editing one item updates every page that contains it
    let mut favorites = feed.watch(1);
    feed.set(1, vec![first[1].clone()]);
    favorites.next().await.context("favorites stream ended")??;

    let mut renamed = first[1].clone();
    renamed.title = "Edited title".to_string();
    feed.items().set(renamed.id, renamed);
    let page = home.next().await.context("feed stream ended")??;
    let favs = favorites.next().await.context("favorites stream ended")??;
    info!("After edit: feed={}, favorites={}", page[1].title, favs[0].title);

    // Optimistic favorite that the server rejects
    let target = page[2].id;
    let outcome = feed
        .optimistic(
            &0,
            |posts| {
                posts
                    .iter()
                    .map(|post| Post {
                        favorite: post.favorite || post.id == target,
                        ..post.clone()
                    })
                    .collect()
            },
            || save_favorite(target),
        )
        .await;
    if let Err(err) = outcome {
        warn!("Optimistic update rolled back: {err}");
    }
    let restored = feed.get(&0).context("page 0 evicted")?;
    info!("Post {} favorite after rollback: {}", target, restored[2].favorite);

    println!("{}", serde_json::to_string_pretty(&restored)?);
    println!("pages: {}", serde_json::to_string_pretty(&feed.stats())?);
    println!("items: {}", serde_json::to_string_pretty(&feed.item_stats())?);

    trim_handle.abort();
    feed.dispose();
    info!("Demo complete");
    Ok(())
}
