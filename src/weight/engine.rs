//! Rating weight engine
//!
//! Keeps each rating's `wilson_score`/`weight` and the parent mod's
//! aggregate consistent with the current set of declarations. Triggered per
//! affected rating by ledger events; every recompute is a pure function of
//! current store state, so duplicate or reordered deliveries converge on
//! the same values.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::stores::{ModAggregate, ModStore, RatingStore};
use super::wilson::wilson_score;
use crate::db::schemas::{RateType, RatingDoc};
use crate::events::{
    DeclarationEvent, Delivery, EventBus, SUBJECT_ALL, SUBJECT_DECLARATION_CANCELLED,
    SUBJECT_DECLARATION_CREATED, SUBJECT_REPORT_CREATED,
};
use crate::types::Result;

/// Target family whose declarations drive the engine
pub const RATE_TARGET_TYPE: &str = "Rate";

/// Averages with fewer valid ratings than this are surfaced as 0 by
/// presentation layers; the stored `rate_avg` itself is never zeroed
pub const MIN_VALID_RATE_COUNT: i64 = 5;

/// Remark length bucket for the weight multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemarkBucket {
    Empty,
    Short,
    Long,
}

impl RemarkBucket {
    pub fn from_length(remark_length: i64) -> Self {
        if remark_length <= 1 {
            Self::Empty
        } else if remark_length <= 140 {
            Self::Short
        } else {
            Self::Long
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Empty => 2.0,
            Self::Short => 8.0,
            Self::Long => 10.0,
        }
    }
}

/// Wilson score of a rating's like/dislike counters
pub fn rating_wilson_score(rating: &RatingDoc) -> f64 {
    let total = rating.like_count + rating.dislike_count;
    wilson_score(rating.like_count, total)
}

/// Composite weight of a rating
///
/// Mark-only ratings and ratings without a numeric score carry no weight
/// regardless of their like/dislike counts.
pub fn rating_weight(rating: &RatingDoc) -> f64 {
    if rating.rate_type == RateType::Mark || rating.rate == 0 {
        return 0.0;
    }

    let bucket = RemarkBucket::from_length(rating.remark_length);
    round2(rating_wilson_score(rating) * bucket.multiplier())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reactive recompute engine for rating weights and mod aggregates
pub struct RatingWeightEngine {
    ratings: Arc<dyn RatingStore>,
    mods: Arc<dyn ModStore>,
}

impl RatingWeightEngine {
    pub fn new(ratings: Arc<dyn RatingStore>, mods: Arc<dyn ModStore>) -> Self {
        Self { ratings, mods }
    }

    /// Compute a mod's aggregate from its public, non-deleted ratings
    ///
    /// Pure; the weighted mean includes every rating (mark weights are 0),
    /// the histogram only scored Rate-type ratings.
    pub fn compute_aggregate(ratings: &[RatingDoc]) -> ModAggregate {
        let mut aggregate = ModAggregate::default();

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for rating in ratings {
            numerator += rating.weight * f64::from(rating.rate);
            denominator += rating.weight;

            match rating.rate_type {
                RateType::Rate => aggregate.rate_count += 1,
                RateType::Mark => aggregate.mark_count += 1,
            }
            if rating.rate > 0 {
                aggregate.valid_rate_count += 1;
            }
            if rating.rate_type == RateType::Rate && rating.rate > 0 {
                *aggregate
                    .rate_info
                    .entry(rating.rate.to_string())
                    .or_insert(0) += 1;
            }
        }

        aggregate.rate_avg = if denominator == 0.0 {
            0.0
        } else {
            numerator / denominator
        };
        aggregate
    }

    /// Recompute one rating's derived scores, then its mod's aggregate
    ///
    /// A rating deleted mid-flight makes this a logged no-op; the ledger is
    /// never at risk from a skipped recompute.
    pub async fn recompute_rating(&self, rating_id: &str) -> Result<()> {
        let Some(rating) = self.ratings.get(rating_id).await? else {
            warn!("Recompute skipped: rating {} not found", rating_id);
            return Ok(());
        };

        let score = rating_wilson_score(&rating);
        let mut scored = rating.clone();
        scored.wilson_score = score;
        let weight = rating_weight(&scored);

        self.ratings.set_scores(rating_id, score, weight).await?;
        debug!(
            "Recomputed rating {}: wilson={} weight={}",
            rating_id, score, weight
        );

        self.recompute_mod_aggregate(&rating.mod_id).await
    }

    /// Recompute one mod's aggregate fields
    pub async fn recompute_mod_aggregate(&self, mod_id: &str) -> Result<()> {
        if !self.mods.exists(mod_id).await? {
            warn!("Recompute skipped: mod {} not found", mod_id);
            return Ok(());
        }

        let ratings = self.ratings.list_public_for_mod(mod_id).await?;
        let aggregate = Self::compute_aggregate(&ratings);
        self.mods.set_aggregate(mod_id, &aggregate).await?;

        debug!(
            "Recomputed mod {} aggregate: avg={} rates={} marks={}",
            mod_id, aggregate.rate_avg, aggregate.rate_count, aggregate.mark_count
        );
        Ok(())
    }

    /// Recompute every mod's aggregate (scheduled maintenance, never on the
    /// reactive path)
    pub async fn recompute_all(&self) -> Result<usize> {
        let mod_ids = self.ratings.list_mod_ids().await?;
        let count = mod_ids.len();
        for mod_id in mod_ids {
            self.recompute_mod_aggregate(&mod_id).await?;
        }
        info!("Full aggregate sweep finished over {} mods", count);
        Ok(count)
    }

    /// React to one delivered event
    ///
    /// Only Rate-family like/dislike transitions and Rate reports trigger a
    /// recompute; everything else is ignored.
    pub async fn handle_event(&self, subject: &str, event: &DeclarationEvent) -> Result<()> {
        if event.target_type != RATE_TARGET_TYPE {
            return Ok(());
        }

        let triggers = match subject {
            SUBJECT_DECLARATION_CREATED | SUBJECT_DECLARATION_CANCELLED => {
                event.kind.is_weight_sensitive()
            }
            SUBJECT_REPORT_CREATED => true,
            _ => false,
        };
        if !triggers {
            return Ok(());
        }

        self.recompute_rating(&event.target_id).await
    }

    /// Subscribe and consume the bus until it closes
    pub async fn run(self: Arc<Self>, bus: Arc<dyn EventBus>) -> Result<()> {
        let deliveries = bus.subscribe(SUBJECT_ALL).await?;
        info!("Rating weight engine subscribed to '{}'", SUBJECT_ALL);
        self.run_with(deliveries).await
    }

    /// Consume an already-established subscription until it closes
    pub async fn run_with(
        self: Arc<Self>,
        mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    ) -> Result<()> {
        while let Some((subject, event)) = deliveries.recv().await {
            if let Err(e) = self.handle_event(&subject, &event).await {
                // recompute failures never propagate to the declaring caller
                error!("Recompute failed for {} on {}: {}", event.target_id, subject, e);
            }
        }

        info!("Rating weight engine stream closed");
        Ok(())
    }
}

/// Spawn the engine's event loop as a background task
///
/// The subscription is established before the task starts, so an event
/// published right after this returns cannot fall into the startup window.
pub async fn spawn_weight_engine(
    engine: Arc<RatingWeightEngine>,
    bus: Arc<dyn EventBus>,
) -> Result<JoinHandle<()>> {
    let deliveries = bus.subscribe(SUBJECT_ALL).await?;
    info!("Rating weight engine subscribed to '{}'", SUBJECT_ALL);

    Ok(tokio::spawn(async move {
        if let Err(e) = engine.run_with(deliveries).await {
            error!("Rating weight engine stopped: {}", e);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{AccessLevel, Metadata};
    use crate::events::LocalEventBus;
    use crate::ledger::{DeclarationKind, DeclarationLedger, MemoryDeclarationStore};
    use crate::registry::TargetRegistry;
    use crate::weight::stores::{MemoryModStore, MemoryRatingStore};
    use std::time::Duration;

    fn rating(mod_id: &str, rate: i32, rate_type: RateType, remark_length: i64) -> RatingDoc {
        RatingDoc {
            mod_id: mod_id.to_string(),
            user_id: "author".to_string(),
            rate,
            rate_type,
            remark_length,
            access_level: AccessLevel::Public,
            ..RatingDoc::default()
        }
    }

    #[test]
    fn test_remark_buckets() {
        assert_eq!(RemarkBucket::from_length(0), RemarkBucket::Empty);
        assert_eq!(RemarkBucket::from_length(1), RemarkBucket::Empty);
        assert_eq!(RemarkBucket::from_length(2), RemarkBucket::Short);
        assert_eq!(RemarkBucket::from_length(140), RemarkBucket::Short);
        assert_eq!(RemarkBucket::from_length(141), RemarkBucket::Long);
        assert_eq!(RemarkBucket::Empty.multiplier(), 2.0);
        assert_eq!(RemarkBucket::Short.multiplier(), 8.0);
        assert_eq!(RemarkBucket::Long.multiplier(), 10.0);
    }

    #[test]
    fn test_weight_zero_for_marks_and_unscored() {
        let mut mark = rating("m1", 8, RateType::Mark, 200);
        mark.like_count = 50.0;
        assert_eq!(rating_weight(&mark), 0.0);

        let mut unscored = rating("m1", 0, RateType::Rate, 200);
        unscored.like_count = 50.0;
        assert_eq!(rating_weight(&unscored), 0.0);
    }

    #[test]
    fn test_weight_single_like_short_remark() {
        // wilson(1, 1) = 0.2026, short bucket multiplier 8
        let mut scored = rating("m1", 8, RateType::Rate, 50);
        scored.like_count = 1.0;
        assert_eq!(rating_weight(&scored), 1.62);
    }

    #[test]
    fn test_weighted_average() {
        let mut a = rating("m1", 8, RateType::Rate, 50);
        a.weight = 4.0;
        let mut b = rating("m1", 6, RateType::Rate, 50);
        b.weight = 6.0;

        let aggregate = RatingWeightEngine::compute_aggregate(&[a, b]);
        assert_eq!(aggregate.rate_avg, 6.8);
        assert_eq!(aggregate.rate_count, 2);
        assert_eq!(aggregate.valid_rate_count, 2);
        assert_eq!(aggregate.rate_info.get("8"), Some(&1));
        assert_eq!(aggregate.rate_info.get("6"), Some(&1));
    }

    #[test]
    fn test_aggregate_of_nothing() {
        let aggregate = RatingWeightEngine::compute_aggregate(&[]);
        assert_eq!(aggregate.rate_avg, 0.0);
        assert_eq!(aggregate.rate_count, 0);
        assert!(aggregate.rate_info.is_empty());
    }

    #[test]
    fn test_histogram_excludes_marks_and_unscored() {
        let mut mark = rating("m1", 7, RateType::Mark, 50);
        mark.weight = 0.0;
        let unscored = rating("m1", 0, RateType::Rate, 50);
        let scored = rating("m1", 7, RateType::Rate, 50);

        let aggregate = RatingWeightEngine::compute_aggregate(&[mark, unscored, scored]);
        assert_eq!(aggregate.rate_info.get("7"), Some(&1));
        assert_eq!(aggregate.rate_info.len(), 1);
        assert_eq!(aggregate.mark_count, 1);
        assert_eq!(aggregate.rate_count, 2);
        assert_eq!(aggregate.valid_rate_count, 2);
    }

    #[tokio::test]
    async fn test_recompute_is_deterministic() {
        let ratings = Arc::new(MemoryRatingStore::new());
        let mods = Arc::new(MemoryModStore::new());
        mods.put_mod("m1");

        let mut r = rating("m1", 8, RateType::Rate, 50);
        r.like_count = 3.0;
        r.dislike_count = 1.0;
        ratings.put_rating("r1", r);

        let engine = RatingWeightEngine::new(ratings, mods.clone());
        engine.recompute_rating("r1").await.unwrap();
        let first = mods.get_aggregate("m1").await.unwrap().unwrap();

        engine.recompute_rating("r1").await.unwrap();
        let second = mods.get_aggregate("m1").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert!(first.rate_avg > 0.0);
    }

    #[tokio::test]
    async fn test_vanished_rating_is_noop() {
        let engine = RatingWeightEngine::new(
            Arc::new(MemoryRatingStore::new()),
            Arc::new(MemoryModStore::new()),
        );
        engine.recompute_rating("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_vanished_mod_is_noop() {
        let ratings = Arc::new(MemoryRatingStore::new());
        ratings.put_rating("r1", rating("ghost-mod", 8, RateType::Rate, 50));

        let engine = RatingWeightEngine::new(ratings, Arc::new(MemoryModStore::new()));
        engine.recompute_rating("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_private_and_deleted_ratings_excluded() {
        let ratings = Arc::new(MemoryRatingStore::new());
        let mods = Arc::new(MemoryModStore::new());
        mods.put_mod("m1");

        let mut public = rating("m1", 8, RateType::Rate, 50);
        public.weight = 4.0;
        ratings.put_rating("r1", public);

        let mut private = rating("m1", 2, RateType::Rate, 50);
        private.weight = 4.0;
        private.access_level = AccessLevel::Private;
        ratings.put_rating("r2", private);

        let mut deleted = rating("m1", 1, RateType::Rate, 50);
        deleted.weight = 4.0;
        deleted.metadata = Metadata {
            is_deleted: true,
            ..Metadata::new()
        };
        ratings.put_rating("r3", deleted);

        let engine = RatingWeightEngine::new(ratings, mods.clone());
        engine.recompute_mod_aggregate("m1").await.unwrap();

        let aggregate = mods.get_aggregate("m1").await.unwrap().unwrap();
        assert_eq!(aggregate.rate_count, 1);
        assert_eq!(aggregate.rate_avg, 8.0);
    }

    #[tokio::test]
    async fn test_non_rate_events_ignored() {
        let ratings = Arc::new(MemoryRatingStore::new());
        let engine = RatingWeightEngine::new(ratings, Arc::new(MemoryModStore::new()));

        // would fail with a storage error if it tried to fetch the rating
        let event = DeclarationEvent::new("Mod", "m1", "u1", DeclarationKind::Like);
        engine
            .handle_event(SUBJECT_DECLARATION_CREATED, &event)
            .await
            .unwrap();

        let follow = DeclarationEvent::new("Rate", "r1", "u1", DeclarationKind::Follow);
        engine
            .handle_event(SUBJECT_DECLARATION_CREATED, &follow)
            .await
            .unwrap();
    }

    /// End-to-end: a like declared through the ledger flows over the bus
    /// into a recomputed weight and mod aggregate.
    #[tokio::test]
    async fn test_like_event_recomputes_weight_and_aggregate() {
        let ratings = Arc::new(MemoryRatingStore::new());
        let mods = Arc::new(MemoryModStore::new());
        let bus = Arc::new(LocalEventBus::new());

        mods.put_mod("m1");
        ratings.put_rating("r1", rating("m1", 8, RateType::Rate, 50));

        let mut registry = TargetRegistry::new();
        registry.register(ratings.clone());
        let ledger = DeclarationLedger::new(
            Arc::new(MemoryDeclarationStore::new()),
            Arc::new(registry),
            bus.clone(),
        );

        let engine = Arc::new(RatingWeightEngine::new(ratings.clone(), mods.clone()));
        // subscribed before the declare below, so the event cannot be missed
        let handle = spawn_weight_engine(engine, bus.clone()).await.unwrap();

        let snapshot = ledger
            .declare_default("Rate", "r1", "u1", DeclarationKind::Like)
            .await
            .unwrap();
        assert_eq!(snapshot.counter("likeCount"), 1.0);

        // wait for the asynchronous recompute to land
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let r1 = ratings.get_rating("r1").unwrap();
            if r1.weight > 0.0 {
                assert_eq!(r1.wilson_score, 0.2026);
                assert_eq!(r1.weight, 1.62);
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "recompute never landed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let aggregate = mods.get_aggregate("m1").await.unwrap().unwrap();
        assert_eq!(aggregate.rate_count, 1);
        assert_eq!(aggregate.rate_avg, 8.0);

        handle.abort();
    }
}
