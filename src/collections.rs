//! Per-user collection buckets with a local membership snapshot.

use crate::api::RequestAuth;
use crate::error::{ClientError, Result};
use crate::models::{Bucket, Series};
use crate::session::Session;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Signed out; nothing was sent.
    RequiresLogin,
}

/// Buckets a series currently belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership(BTreeSet<Bucket>);

impl Membership {
    pub fn contains(&self, bucket: Bucket) -> bool {
        self.0.contains(&bucket)
    }

    pub fn buckets(&self) -> impl Iterator<Item = Bucket> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    owner: Option<i64>,
    buckets: HashMap<Bucket, BTreeSet<i64>>,
}

impl Snapshot {
    /// Buckets of `user_id`, dropping anything recorded for another user.
    fn for_user(&mut self, user_id: i64) -> &mut HashMap<Bucket, BTreeSet<i64>> {
        if self.owner != Some(user_id) {
            self.owner = Some(user_id);
            self.buckets.clear();
        }
        &mut self.buckets
    }
}

pub struct CollectionManager {
    session: Arc<Session>,
    snapshot: RwLock<Snapshot>,
}

impl CollectionManager {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    fn signed_in(&self) -> Option<(RequestAuth, i64)> {
        let auth = self.session.auth();
        let user_id = auth.user_id?;
        auth.is_authenticated().then_some((auth, user_id))
    }

    /// Fetches `bucket` unless the snapshot already holds it for this user.
    async fn ensure_loaded(&self, auth: &RequestAuth, user_id: i64, bucket: Bucket) -> Result<()> {
        let loaded = {
            let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
            snapshot.owner == Some(user_id) && snapshot.buckets.contains_key(&bucket)
        };
        if loaded {
            return Ok(());
        }
        let ids = self.session.api().collection(auth, user_id, bucket).await?;
        debug!("Loaded {} series ids for {}", ids.len(), bucket);
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .for_user(user_id)
            .entry(bucket)
            .or_insert_with(|| ids.into_iter().collect());
        Ok(())
    }

    fn contains(&self, user_id: i64, bucket: Bucket, series_id: i64) -> bool {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot.owner == Some(user_id)
            && snapshot
                .buckets
                .get(&bucket)
                .is_some_and(|ids| ids.contains(&series_id))
    }

    fn set(&self, user_id: i64, bucket: Bucket, series_id: i64, present: bool) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let ids = snapshot.for_user(user_id).entry(bucket).or_default();
        if present {
            ids.insert(series_id);
        } else {
            ids.remove(&series_id);
        }
    }

    /// Adds the series when absent from the bucket, removes it otherwise. A
    /// bucket not yet in the snapshot is read from the server first; the
    /// snapshot only changes once the server accepted the mutation.
    pub async fn toggle_membership(&self, bucket: Bucket, series_id: i64) -> Result<ToggleOutcome> {
        let Some((auth, user_id)) = self.signed_in() else {
            debug!("Toggling {} needs a signed-in user", bucket);
            return Ok(ToggleOutcome::RequiresLogin);
        };
        self.ensure_loaded(&auth, user_id, bucket).await?;
        let api = self.session.api();

        if self.contains(user_id, bucket, series_id) {
            api.remove_from_collection(&auth, user_id, bucket, series_id)
                .await?;
            self.set(user_id, bucket, series_id, false);
            info!("Removed series {} from {}", series_id, bucket);
            Ok(ToggleOutcome::Removed)
        } else {
            api.add_to_collection(&auth, user_id, bucket, series_id)
                .await?;
            self.set(user_id, bucket, series_id, true);
            info!("Added series {} to {}", series_id, bucket);
            Ok(ToggleOutcome::Added)
        }
    }

    /// Adds without toggling; a series already in the bucket is left alone.
    pub async fn add(&self, bucket: Bucket, series_id: i64) -> Result<ToggleOutcome> {
        let Some((auth, user_id)) = self.signed_in() else {
            return Ok(ToggleOutcome::RequiresLogin);
        };
        self.ensure_loaded(&auth, user_id, bucket).await?;
        if self.contains(user_id, bucket, series_id) {
            return Ok(ToggleOutcome::Added);
        }
        self.session
            .api()
            .add_to_collection(&auth, user_id, bucket, series_id)
            .await?;
        self.set(user_id, bucket, series_id, true);
        info!("Added series {} to {}", series_id, bucket);
        Ok(ToggleOutcome::Added)
    }

    /// Reloads every bucket from the server. Signed out, the snapshot is emptied.
    pub async fn refresh(&self) -> Result<()> {
        let Some((auth, user_id)) = self.signed_in() else {
            *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Snapshot::default();
            return Ok(());
        };
        let collections = self.session.api().collections(&auth, user_id).await?;

        let mut fresh: HashMap<Bucket, BTreeSet<i64>> =
            Bucket::ALL.into_iter().map(|b| (b, BTreeSet::new())).collect();
        for collection in collections {
            match collection.bucket() {
                Some(bucket) => {
                    fresh
                        .entry(bucket)
                        .or_default()
                        .extend(collection.series_ids);
                }
                None => debug!("Skipping unknown collection '{}'", collection.name),
            }
        }
        debug!("Collection snapshot now covers {} buckets", fresh.len());
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Snapshot {
            owner: Some(user_id),
            buckets: fresh,
        };
        Ok(())
    }

    /// Snapshot view of which buckets hold `series_id`.
    pub fn membership(&self, series_id: i64) -> Membership {
        let Some(user_id) = self.session.auth().user_id else {
            return Membership::default();
        };
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        if snapshot.owner != Some(user_id) {
            return Membership::default();
        }
        Membership(
            snapshot
                .buckets
                .iter()
                .filter(|(_, ids)| ids.contains(&series_id))
                .map(|(bucket, _)| *bucket)
                .collect(),
        )
    }

    /// Series in `bucket`, resolved concurrently. Ids that fail to resolve are skipped.
    pub async fn load_memberships(&self, bucket: Bucket) -> Result<Vec<Series>> {
        let Some((auth, user_id)) = self.signed_in() else {
            return Err(ClientError::Unauthorized);
        };
        let api = self.session.api();
        let ids = api.collection(&auth, user_id, bucket).await?;
        {
            let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            snapshot
                .for_user(user_id)
                .insert(bucket, ids.iter().copied().collect());
        }

        let results = join_all(ids.iter().map(|id| api.series(&auth, *id))).await;
        let series: Vec<Series> = ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(series) => Some(series),
                Err(e) => {
                    warn!("Failed to load series {} from {}: {}", id, bucket, e);
                    None
                }
            })
            .collect();
        info!("Loaded {} of {} series in {}", series.len(), ids.len(), bucket);
        Ok(series)
    }
}
