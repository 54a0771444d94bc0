mod support;

use std::time::Duration;

use support::{Fixture, viewer};
use yatube::application::auth::Viewer;
use yatube::application::posts::PostForm;

#[tokio::test]
async fn cached_global_page_survives_deletion_until_cleared() {
    let fx = Fixture::new();
    let author = fx.store.add_user("auth").await;
    let post = fx.store.add_post(&author, "soon gone", None).await;

    let before = fx.feed.list_global(1).await.expect("global");
    assert_eq!(before.posts.items[0].id, post.id);

    fx.store.remove_post(post.id).await;

    let stale = fx.feed.list_global(1).await.expect("global");
    assert_eq!(stale, before);

    fx.feed.clear_page_cache();

    let fresh = fx.feed.list_global(1).await.expect("global");
    assert!(fresh.posts.is_empty());
}

#[tokio::test]
async fn new_posts_stay_hidden_until_cache_clears() {
    let fx = Fixture::new();
    let author = fx.store.add_user("auth").await;
    fx.store.add_post(&author, "first", None).await;

    let before = fx.feed.list_global(1).await.expect("global");
    assert_eq!(before.posts.len(), 1);

    fx.posts
        .create_post(
            &viewer(&author),
            PostForm {
                text: "second".to_string(),
                ..PostForm::default()
            },
        )
        .await
        .expect("create");

    let cached = fx.feed.list_global(1).await.expect("global");
    assert_eq!(cached.posts.len(), 1);

    fx.feed.clear_page_cache();
    let fresh = fx.feed.list_global(1).await.expect("global");
    assert_eq!(fresh.posts.len(), 2);
    assert_eq!(fresh.posts.items[0].text, "second");
}

#[tokio::test(start_paused = true)]
async fn cached_page_expires_after_ttl() {
    let fx = Fixture::with_ttl(Duration::from_secs(20));
    let author = fx.store.add_user("auth").await;
    let post = fx.store.add_post(&author, "short lived", None).await;

    fx.feed.list_global(1).await.expect("global");
    fx.store.remove_post(post.id).await;

    tokio::time::advance(Duration::from_secs(10)).await;
    let still_cached = fx.feed.list_global(1).await.expect("global");
    assert_eq!(still_cached.posts.len(), 1);

    tokio::time::advance(Duration::from_secs(11)).await;
    let expired = fx.feed.list_global(1).await.expect("global");
    assert!(expired.posts.is_empty());
}

#[tokio::test]
async fn pages_are_cached_independently() {
    let fx = Fixture::new();
    let author = fx.store.add_user("auth").await;
    fx.store.add_posts(&author, 12, None).await;

    let first = fx.feed.list_global(1).await.expect("global");
    let second = fx.feed.list_global(2).await.expect("global");

    assert_eq!(first.posts.number, 1);
    assert_eq!(second.posts.number, 2);
    let cache = fx.cache.as_ref().expect("cache configured");
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn out_of_range_request_is_cached_under_requested_page() {
    let fx = Fixture::new();
    let author = fx.store.add_user("auth").await;
    fx.store.add_posts(&author, 12, None).await;

    let clamped = fx.feed.list_global(7).await.expect("global");
    let last = fx.feed.list_global(2).await.expect("global");

    assert_eq!(clamped.posts.number, 2);
    assert_eq!(clamped, last);
    assert_eq!(fx.cache.as_ref().expect("cache configured").len(), 2);
}

#[tokio::test]
async fn group_and_profile_feeds_are_never_cached() {
    let fx = Fixture::new();
    let author = fx.store.add_user("auth").await;
    let group = fx.store.add_group("Group", "group").await;
    let grouped = fx.store.add_post(&author, "in group", Some(&group)).await;
    let loose = fx.store.add_post(&author, "no group", None).await;

    fx.feed.list_by_group("group", 1).await.expect("group");
    let profile = fx
        .feed
        .list_by_profile("auth", &Viewer::Anonymous, 1)
        .await
        .expect("profile");
    assert_eq!(profile.post_count, 2);

    fx.store.remove_post(grouped.id).await;
    fx.store.remove_post(loose.id).await;

    let group_feed = fx.feed.list_by_group("group", 1).await.expect("group");
    assert!(group_feed.posts.is_empty());
    let profile = fx
        .feed
        .list_by_profile("auth", &Viewer::Anonymous, 1)
        .await
        .expect("profile");
    assert!(profile.posts.is_empty());
    assert_eq!(profile.post_count, 0);
    assert!(fx.cache.as_ref().expect("cache configured").is_empty());
}

#[tokio::test]
async fn disabled_cache_reads_through() {
    let fx = Fixture::without_cache();
    let author = fx.store.add_user("auth").await;
    let post = fx.store.add_post(&author, "visible", None).await;

    assert_eq!(fx.feed.list_global(1).await.expect("global").posts.len(), 1);
    fx.store.remove_post(post.id).await;
    assert!(fx.feed.list_global(1).await.expect("global").posts.is_empty());

    fx.feed.clear_page_cache();
}
