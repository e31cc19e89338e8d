mod common;

use std::sync::Arc;

use chatty_core::DisabledCompletion;

use common::harness;

fn current_id(response: &chatty_types::api::DiscoveryResponse) -> Option<&str> {
    response.candidate.as_ref().map(|u| u.id.as_str())
}

#[tokio::test]
async fn like_skip_like_walks_the_stream() {
    let h = harness(Arc::new(DisabledCompletion));
    for id in ["dave", "p1", "p2", "p3", "p4", "p5"] {
        h.user(id).await;
    }
    let discovery = h.engine.discovery();

    let start = discovery.current("dave").await.unwrap();
    assert_eq!(start.position, 0);
    assert_eq!(current_id(&start), Some("p1"));

    discovery.like("dave").await.unwrap();
    discovery.skip("dave").await.unwrap();
    let after = discovery.like("dave").await.unwrap();
    assert_eq!(after.position, 3);
    assert_eq!(current_id(&after), Some("p4"));
    assert!(!after.exhausted);

    let dave = h.db.get_user("dave").unwrap().unwrap();
    let liked: Vec<_> = dave.liked_profiles.iter().map(String::as_str).collect();
    assert_eq!(liked, vec!["p1", "p3"]);

    let fresh = discovery.refresh("dave").await.unwrap();
    assert_eq!(fresh.position, 0);
    assert_eq!(current_id(&fresh), Some("p4"));
}

#[tokio::test]
async fn exhaustion_is_restartable() {
    let h = harness(Arc::new(DisabledCompletion));
    h.user("dave").await;
    h.user("p1").await;
    let discovery = h.engine.discovery();

    discovery.like("dave").await.unwrap();
    let done = discovery.current("dave").await.unwrap();
    assert!(done.exhausted);
    assert!(done.candidate.is_none());

    // A new signup reopens the stream
    h.user("p9").await;
    let reopened = discovery.current("dave").await.unwrap();
    assert!(!reopened.exhausted);
    assert_eq!(current_id(&reopened), Some("p9"));
}

#[tokio::test]
async fn friends_never_show_up() {
    let h = harness(Arc::new(DisabledCompletion));
    for id in ["dave", "p1", "p2"] {
        h.user(id).await;
    }
    h.friends("dave", "p1").await;

    let start = h.engine.discovery().current("dave").await.unwrap();
    assert_eq!(current_id(&start), Some("p2"));
}

#[tokio::test]
async fn new_friend_is_never_served_from_an_open_session() {
    let h = harness(Arc::new(DisabledCompletion));
    for id in ["dave", "p1", "p2"] {
        h.user(id).await;
    }
    let discovery = h.engine.discovery();
    assert_eq!(current_id(&discovery.current("dave").await.unwrap()), Some("p1"));

    h.friends("dave", "p2").await;
    let after = discovery.like("dave").await.unwrap();
    assert!(after.exhausted);
    assert_eq!(current_id(&after), None);
}

#[tokio::test]
async fn candidate_under_the_cursor_is_rechecked() {
    let h = harness(Arc::new(DisabledCompletion));
    for id in ["dave", "p1", "p2", "p3"] {
        h.user(id).await;
    }
    let discovery = h.engine.discovery();
    assert_eq!(current_id(&discovery.current("dave").await.unwrap()), Some("p1"));

    // Liked from the people page, outside the stream
    h.engine.graph().like_profile("dave", "p1").await.unwrap();
    h.friends("p2", "dave").await;

    let now = discovery.current("dave").await.unwrap();
    assert_eq!(current_id(&now), Some("p3"));
    assert_eq!(now.position, 2);

    // A skip applies to the candidate actually shown
    discovery.skip("dave").await.unwrap();
    let dave = h.db.get_user("dave").unwrap().unwrap();
    assert!(!dave.liked_profiles.contains("p3"));
}

#[tokio::test]
async fn placeholders_are_not_offered() {
    let h = harness(Arc::new(DisabledCompletion));
    h.user("dave").await;
    h.engine.profiles().ensure_user("ghost", "ghost@test").await.unwrap();
    h.user("p1").await;

    let start = h.engine.discovery().current("dave").await.unwrap();
    assert_eq!(current_id(&start), Some("p1"));

    h.engine.discovery().like("dave").await.unwrap();
    assert!(h.engine.discovery().current("dave").await.unwrap().exhausted);
}
