mod support;

use yatube::application::auth::Viewer;
use yatube::application::feed::FeedError;

use support::{Fixture, viewer};

#[tokio::test]
async fn group_listing_contains_only_group_posts_newest_first() {
    let fx = Fixture::without_cache();
    let author = fx.store.add_user("auth").await;
    let cats = fx.store.add_group("Cats", "cats").await;
    let dogs = fx.store.add_group("Dogs", "dogs").await;

    let first = fx.store.add_post(&author, "first cat", Some(&cats)).await;
    fx.store.add_post(&author, "a dog", Some(&dogs)).await;
    fx.store.add_post(&author, "no group", None).await;
    let second = fx.store.add_post(&author, "second cat", Some(&cats)).await;

    let feed = fx.feed.list_by_group("cats", 1).await.expect("group feed");

    assert_eq!(feed.group.slug, "cats");
    let ids: Vec<i64> = feed.posts.items.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(
        feed.posts
            .items
            .iter()
            .all(|post| post.group.as_ref().map(|g| g.id) == Some(cats.id))
    );
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let fx = Fixture::without_cache();
    let err = fx
        .feed
        .list_by_group("missing", 1)
        .await
        .expect_err("unknown slug");
    assert!(matches!(err, FeedError::NotFound { entity: "group" }));
}

#[tokio::test]
async fn profile_lists_only_the_author() {
    let fx = Fixture::without_cache();
    let leo = fx.store.add_user("leo").await;
    let other = fx.store.add_user("other").await;
    fx.store.add_posts(&leo, 3, None).await;
    fx.store.add_posts(&other, 2, None).await;

    let profile = fx
        .feed
        .list_by_profile("leo", &Viewer::Anonymous, 1)
        .await
        .expect("profile");

    assert_eq!(profile.author.username, "leo");
    assert_eq!(profile.post_count, 3);
    assert!(profile.posts.items.iter().all(|post| post.author.id == leo.id));
    assert!(!profile.is_following);
}

#[tokio::test]
async fn profile_reports_following_for_subscribers_only() {
    let fx = Fixture::without_cache();
    let author = fx.store.add_user("author").await;
    let fan = fx.store.add_user("fan").await;
    fx.follows.follow(fan.id, author.id).await.expect("follow");

    let as_fan = fx
        .feed
        .list_by_profile("author", &viewer(&fan), 1)
        .await
        .expect("profile");
    assert!(as_fan.is_following);

    let as_self = fx
        .feed
        .list_by_profile("author", &viewer(&author), 1)
        .await
        .expect("profile");
    assert!(!as_self.is_following);
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let fx = Fixture::without_cache();
    let err = fx
        .feed
        .list_by_profile("ghost", &Viewer::Anonymous, 1)
        .await
        .expect_err("unknown username");
    assert!(matches!(err, FeedError::NotFound { entity: "author" }));
}

#[tokio::test]
async fn twelve_posts_paginate_into_ten_and_two_everywhere() {
    let fx = Fixture::without_cache();
    let author = fx.store.add_user("auth").await;
    let group = fx.store.add_group("Test group", "test-slug").await;
    fx.store.add_posts(&author, 12, Some(&group)).await;

    let global_first = fx.feed.list_global(1).await.expect("global");
    let global_second = fx.feed.list_global(2).await.expect("global");
    assert_eq!(global_first.posts.len(), 10);
    assert_eq!(global_second.posts.len(), 2);

    let group_first = fx.feed.list_by_group("test-slug", 1).await.expect("group");
    let group_second = fx.feed.list_by_group("test-slug", 2).await.expect("group");
    assert_eq!(group_first.posts.len(), 10);
    assert_eq!(group_second.posts.len(), 2);

    let anon = Viewer::Anonymous;
    let profile_first = fx.feed.list_by_profile("auth", &anon, 1).await.expect("profile");
    let profile_second = fx.feed.list_by_profile("auth", &anon, 2).await.expect("profile");
    assert_eq!(profile_first.posts.len(), 10);
    assert_eq!(profile_second.posts.len(), 2);
    assert_eq!(profile_second.post_count, 12);
}

#[tokio::test]
async fn out_of_range_page_clamps_to_last_page() {
    let fx = Fixture::without_cache();
    let author = fx.store.add_user("auth").await;
    let posts = fx.store.add_posts(&author, 12, None).await;

    let feed = fx.feed.list_global(7).await.expect("global");

    assert_eq!(feed.posts.number, 2);
    assert_eq!(feed.posts.num_pages, 2);
    let ids: Vec<i64> = feed.posts.items.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![posts[1].id, posts[0].id]);
}

#[tokio::test]
async fn empty_listing_is_one_empty_page() {
    let fx = Fixture::without_cache();
    let feed = fx.feed.list_global(3).await.expect("global");
    assert!(feed.posts.is_empty());
    assert_eq!(feed.posts.number, 1);
    assert!(!feed.posts.has_next);
    assert!(!feed.posts.has_previous);
}

#[tokio::test]
async fn follow_feed_shows_posts_of_followed_authors_only() {
    let fx = Fixture::without_cache();
    let reader = fx.store.add_user("x").await;
    let followed = fx.store.add_user("y").await;
    let stranger = fx.store.add_user("z").await;

    fx.follows.follow(reader.id, followed.id).await.expect("follow");
    let hello = fx.store.add_post(&followed, "hello", None).await;
    fx.store.add_post(&stranger, "not for x", None).await;

    let feed = fx
        .feed
        .list_follow_feed(&viewer(&reader), 1)
        .await
        .expect("follow feed");
    assert_eq!(feed.posts.len(), 1);
    assert_eq!(feed.posts.items[0].id, hello.id);
    assert_eq!(feed.posts.items[0].text, "hello");

    let followed_feed = fx
        .feed
        .list_follow_feed(&viewer(&followed), 1)
        .await
        .expect("follow feed");
    assert!(followed_feed.posts.is_empty());

    let stranger_feed = fx
        .feed
        .list_follow_feed(&viewer(&stranger), 1)
        .await
        .expect("follow feed");
    assert!(stranger_feed.posts.items.iter().all(|post| post.text != "hello"));
}

#[tokio::test]
async fn follow_feed_is_union_of_followed_authors() {
    let fx = Fixture::without_cache();
    let reader = fx.store.add_user("reader").await;
    let a = fx.store.add_user("a").await;
    let b = fx.store.add_user("b").await;
    let c = fx.store.add_user("c").await;
    fx.follows.follow(reader.id, a.id).await.expect("follow");
    fx.follows.follow(reader.id, b.id).await.expect("follow");

    fx.store.add_posts(&a, 2, None).await;
    fx.store.add_posts(&b, 3, None).await;
    fx.store.add_posts(&c, 4, None).await;

    let feed = fx
        .feed
        .list_follow_feed(&viewer(&reader), 1)
        .await
        .expect("follow feed");
    assert_eq!(feed.posts.total_items, 5);
    assert!(
        feed.posts
            .items
            .iter()
            .all(|post| post.author.id == a.id || post.author.id == b.id)
    );
}

#[tokio::test]
async fn following_nobody_yields_an_empty_page() {
    let fx = Fixture::without_cache();
    let reader = fx.store.add_user("reader").await;
    let writer = fx.store.add_user("writer").await;
    fx.store.add_posts(&writer, 3, None).await;

    let feed = fx
        .feed
        .list_follow_feed(&viewer(&reader), 1)
        .await
        .expect("follow feed");
    assert!(feed.posts.is_empty());
    assert_eq!(feed.posts.number, 1);
}

#[tokio::test]
async fn anonymous_follow_feed_is_unauthorized() {
    let fx = Fixture::without_cache();
    let err = fx
        .feed
        .list_follow_feed(&Viewer::Anonymous, 1)
        .await
        .expect_err("anonymous viewer");
    assert!(matches!(err, FeedError::Unauthorized(_)));
}

#[tokio::test]
async fn post_detail_includes_comments_oldest_first() {
    let fx = Fixture::without_cache();
    let author = fx.store.add_user("author").await;
    let reader = fx.store.add_user("reader").await;
    let group = fx.store.add_group("Group", "group").await;
    let post = fx
        .store
        .add_post(&author, "a post with a long body", Some(&group))
        .await;
    fx.store.add_post(&author, "another", None).await;

    let reader_viewer = viewer(&reader);
    for text in ["first", "second"] {
        fx.posts
            .add_comment(
                &reader_viewer,
                post.id,
                yatube::application::posts::CommentForm {
                    text: text.to_string(),
                },
            )
            .await
            .expect("comment");
    }

    let detail = fx.feed.post_detail(post.id).await.expect("detail");

    assert_eq!(detail.post.id, post.id);
    assert_eq!(detail.post.label, "a post with a l");
    assert_eq!(detail.author.username, "author");
    assert_eq!(detail.group.as_ref().map(|g| g.slug.as_str()), Some("group"));
    assert_eq!(detail.author_post_count, 2);
    let texts: Vec<&str> = detail.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert!(detail.comments.iter().all(|c| c.author.id == reader.id));
}

#[tokio::test]
async fn missing_post_detail_is_not_found() {
    let fx = Fixture::without_cache();
    let err = fx.feed.post_detail(404).await.expect_err("missing post");
    assert!(matches!(err, FeedError::NotFound { entity: "post" }));
}
