mod common;

use common::{actor, anonymous_session, award, FakeApi};
use siamlacorns::actors::ActorDirectory;
use siamlacorns::error::ClientError;
use std::sync::Arc;

fn api() -> Arc<FakeApi> {
    let api = FakeApi::new();
    api.people.lock().unwrap().extend([
        (3, actor(3, "Mario Maurer")),
        (4, actor(4, "Urassaya Sperbund")),
        (5, actor(5, "Marie Broenner")),
    ]);
    api.awards
        .lock()
        .unwrap()
        .insert(3, vec![award(2008, "Best Actor")]);
    Arc::new(api)
}

#[tokio::test]
async fn profile_joins_awards() {
    let api = api();
    let directory = ActorDirectory::new(anonymous_session(api.clone()));

    let mario = directory.profile(3).await.unwrap();
    assert_eq!(mario.name, "Mario Maurer");
    assert_eq!(mario.awards, vec![award(2008, "Best Actor")]);

    assert_eq!(
        directory.profile(99).await.unwrap_err(),
        ClientError::NotFound("actor 99".to_string())
    );
}

#[tokio::test]
async fn award_failure_keeps_the_profile() {
    let api = api();
    *api.fail_awards.lock().unwrap() = true;
    let directory = ActorDirectory::new(anonymous_session(api.clone()));

    let mario = directory.profile(3).await.unwrap();
    assert_eq!(mario.id, 3);
    assert!(mario.awards.is_empty());
    assert_eq!(api.calls_starting_with("actor_awards 3"), 1);
}

#[tokio::test]
async fn popular_and_search() {
    let api = api();
    let directory = ActorDirectory::new(anonymous_session(api.clone()));

    let popular = directory.popular(0, 2).await.unwrap();
    let ids: Vec<i64> = popular.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![3, 4]);

    let found = directory.search("  mar ").await.unwrap();
    let ids: Vec<i64> = found.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![3, 5]);

    assert!(directory.search("   ").await.unwrap().is_empty());
    assert_eq!(
        api.calls(),
        vec!["popular_actors 0 2", "search_actors mar"]
    );
}
