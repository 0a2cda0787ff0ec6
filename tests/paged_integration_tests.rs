//! Integration Tests for PagedCache
//!
//! Pages are views over a shared item cache: item edits fan out to every page.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reactive_cache::error::BoxError;
use reactive_cache::{CacheConfig, PagedCache, PagedConfig, StreamOptions};
use tokio_test::{assert_pending, task};

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: u32,
    v: u32,
}

fn item(id: u32, v: u32) -> Item {
    Item { id, v }
}

fn paged(pages: usize) -> PagedCache<String, u32, Item> {
    PagedCache::new(
        PagedConfig::new(CacheConfig::new().with_size(pages)).with_page_size(4),
        |item: &Item| item.id,
    )
}

#[tokio::test]
async fn test_item_update_fans_out_to_page_subscribers() {
    let cache = paged(4);
    let mut stream = cache.watch("search".to_string());
    cache.set("search".to_string(), vec![item(1, 1), item(2, 1)]);
    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        vec![item(1, 1), item(2, 1)]
    );

    cache.items().set(1, item(1, 2));

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        vec![item(1, 2), item(2, 1)]
    );
}

#[tokio::test]
async fn test_shared_item_updates_every_page() {
    let cache = paged(4);
    let mut search = cache.watch("search".to_string());
    let mut favorites = cache.watch("favorites".to_string());
    cache.set("search".to_string(), vec![item(1, 0), item(2, 0)]);
    cache.set("favorites".to_string(), vec![item(2, 0)]);
    search.next().await.unwrap().unwrap();
    favorites.next().await.unwrap().unwrap();

    cache.items().set(2, item(2, 5));

    assert_eq!(
        search.next().await.unwrap().unwrap(),
        vec![item(1, 0), item(2, 5)]
    );
    assert_eq!(favorites.next().await.unwrap().unwrap(), vec![item(2, 5)]);
    assert_eq!(cache.item_stats().total_entries, 2);
}

#[tokio::test]
async fn test_page_loader_runs_once_and_feeds_items() {
    let cache = paged(4);
    let calls = Arc::new(AtomicUsize::new(0));
    let options = || {
        let calls = Arc::clone(&calls);
        StreamOptions::new().if_absent(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(vec![item(10, 1), item(11, 1)])
        })
    };

    let mut first = cache.stream("feed".to_string(), options());
    let mut second = cache.stream("feed".to_string(), options());

    let expected = vec![item(10, 1), item(11, 1)];
    assert_eq!(first.next().await.unwrap().unwrap(), expected);
    assert_eq!(second.next().await.unwrap().unwrap(), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.items().get(&11), Some(item(11, 1)));
}

fn expiring(max_age: Duration) -> PagedCache<String, u32, Item> {
    PagedCache::new(
        PagedConfig::new(CacheConfig::new().with_size(4).with_max_age(max_age)).with_page_size(4),
        |item: &Item| item.id,
    )
}

#[tokio::test(start_paused = true)]
async fn test_stale_page_reload_delivers_identical_page() {
    let cache = expiring(Duration::from_secs(1));
    cache.set("feed".to_string(), vec![item(1, 0), item(2, 0)]);
    tokio::time::advance(Duration::from_secs(2)).await;

    let mut stream = cache.stream(
        "feed".to_string(),
        StreamOptions::new()
            .if_absent(|| async { Ok::<_, BoxError>(vec![item(1, 0), item(2, 0)]) }),
    );

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        vec![item(1, 0), item(2, 0)]
    );
    assert_eq!(
        cache.get(&"feed".to_string()),
        Some(vec![item(1, 0), item(2, 0)])
    );
    let mut next = task::spawn(stream.next());
    assert_pending!(next.poll());
}

#[tokio::test(start_paused = true)]
async fn test_stale_page_reload_delivers_changed_page() {
    let cache = expiring(Duration::from_secs(1));
    cache.set("feed".to_string(), vec![item(1, 0), item(2, 0)]);
    tokio::time::advance(Duration::from_secs(2)).await;

    let mut stream = cache.stream(
        "feed".to_string(),
        StreamOptions::new()
            .if_absent(|| async { Ok::<_, BoxError>(vec![item(2, 1), item(3, 0)]) }),
    );

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        vec![item(2, 1), item(3, 0)]
    );
    assert_eq!(cache.items().get(&2), Some(item(2, 1)));
    let mut next = task::spawn(stream.next());
    assert_pending!(next.poll());
}

#[tokio::test]
async fn test_empty_page_emits_empty_list() {
    let cache = paged(4);
    let mut stream = cache.watch("nothing".to_string());
    cache.set("nothing".to_string(), Vec::new());

    assert_eq!(stream.next().await.unwrap().unwrap(), Vec::<Item>::new());
}

#[tokio::test]
async fn test_refresh_does_not_publish_half_updated_page() {
    let cache = paged(4);
    let mut stream = cache.watch("feed".to_string());
    cache.set("feed".to_string(), vec![item(1, 0), item(2, 0)]);
    stream.next().await.unwrap().unwrap();

    cache.set("feed".to_string(), vec![item(1, 1), item(2, 1)]);

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        vec![item(1, 1), item(2, 1)]
    );
    let mut next = task::spawn(stream.next());
    assert_pending!(next.poll());
}

#[tokio::test]
async fn test_optimistic_page_update_rolls_back_items() {
    let cache = paged(4);
    cache.set("feed".to_string(), vec![item(1, 0), item(2, 0)]);
    cache.set("detail".to_string(), vec![item(2, 0)]);
    let mut detail = cache.watch("detail".to_string());
    detail.next().await.unwrap().unwrap();

    let result = cache
        .optimistic(
            &"feed".to_string(),
            |page| {
                page.iter()
                    .map(|it| if it.id == 2 { item(2, 1) } else { it.clone() })
                    .collect()
            },
            || async { Err::<(), _>("rejected") },
        )
        .await;

    assert_eq!(result, Err("rejected"));
    assert_eq!(detail.next().await.unwrap().unwrap(), vec![item(2, 1)]);
    assert_eq!(detail.next().await.unwrap().unwrap(), vec![item(2, 0)]);
    assert_eq!(cache.items().get(&2), Some(item(2, 0)));
    assert_eq!(cache.stats().rollbacks, 1);
}

#[test]
fn test_items_of_listened_page_survive_item_bound() {
    // One page of four, item bound 1 * 4 = 4
    let cache = paged(1);
    let _stream = cache.watch("big".to_string());
    cache.set(
        "big".to_string(),
        vec![item(1, 0), item(2, 0), item(3, 0), item(4, 0)],
    );
    for id in 100..120 {
        cache.items().set(id, item(id, 0));
    }

    for id in 1..=4 {
        assert!(cache.items().get(&id).is_some(), "member {id} evicted");
    }
    assert_eq!(cache.get(&"big".to_string()).map(|page| page.len()), Some(4));
}

#[test]
fn test_clear_and_dispose() {
    let cache = paged(4);
    cache.set("a".to_string(), vec![item(1, 0)]);

    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.items().is_empty());

    cache.set("a".to_string(), vec![item(1, 0)]);
    assert_eq!(cache.len(), 1);

    cache.dispose();
    cache.dispose();
    cache.set("b".to_string(), vec![item(2, 0)]);
    assert!(cache.is_empty());
}
