//! Actor lookups: profiles with awards, popular actors and name search.

use crate::api::best_effort_list;
use crate::error::Result;
use crate::models::Actor;
use crate::session::Session;
use std::sync::Arc;
use tracing::info;

pub struct ActorDirectory {
    session: Arc<Session>,
}

impl ActorDirectory {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// The actor with awards filled in. The award list is secondary: if it
    /// fails to load the profile still comes back, with whatever it carried.
    pub async fn profile(&self, id: i64) -> Result<Actor> {
        let api = self.session.api();
        let auth = self.session.auth();
        let (actor, awards) = tokio::join!(
            api.actor(&auth, id),
            best_effort_list("actor awards", api.actor_awards(&auth, id)),
        );
        let mut actor = actor?;
        if !awards.is_empty() {
            actor.awards = awards;
        }
        Ok(actor)
    }

    pub async fn popular(&self, page: u32, size: u32) -> Result<Vec<Actor>> {
        self.session
            .api()
            .popular_actors(&self.session.auth(), page, size)
            .await
    }

    /// Name search; a blank query matches nobody and sends nothing.
    pub async fn search(&self, query: &str) -> Result<Vec<Actor>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let found = self
            .session
            .api()
            .search_actors(&self.session.auth(), query)
            .await?;
        info!("Actor search '{}' matched {}", query, found.len());
        Ok(found)
    }
}
