use super::db_structs::DbError;
use crate::{
    model::{
        identity::{Item, ItemRelationship},
        parameters::{OutcomeScores, ParameterSet, ParameterValues},
        structures::{
            comparison::Comparison,
            outcome_level::OutcomeLevel,
            passive_event::{PassiveEvent, PassiveEventDetails, PassiveEventKind},
            rating::{Rating, RatingState},
            relationship_kind::RelationshipKind,
            snapshot::EngineSnapshot
        }
    },
    utils::progress_utils::progress_bar
};
use itertools::Itertools;
use postgres_types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

const SCHEMA: &str = include_str!("schema.sql");

/// Advisory lock key guarding the whole engine state ("musicelo")
const STATE_LOCK_KEY: i64 = 0x6d75_7369_6365_6c6f;

pub struct DbClient {
    client: Client
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, DbError> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient { client })
    }

    /// Creates any missing tables. Safe to run on every start.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        info!("Ensuring database schema...");
        self.client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    pub async fn load_snapshot(&self) -> Result<EngineSnapshot, DbError> {
        info!("Fetching parameter sets...");
        let parameter_sets = self
            .client
            .query("SELECT * FROM parameter_sets ORDER BY id", &[])
            .await?
            .iter()
            .map(Self::parameter_set_from_row)
            .collect_vec();

        info!("Fetching items...");
        let items = self
            .client
            .query("SELECT * FROM items ORDER BY id", &[])
            .await?
            .iter()
            .map(Self::item_from_row)
            .collect_vec();

        let relationships = self
            .client
            .query("SELECT * FROM item_relationships ORDER BY id", &[])
            .await?
            .iter()
            .map(Self::relationship_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        info!("Fetching ratings...");
        let ratings = self
            .client
            .query("SELECT * FROM ratings ORDER BY item_id", &[])
            .await?
            .iter()
            .map(Self::rating_from_row)
            .collect_vec();

        info!("Fetching comparisons...");
        let rows = self
            .client
            .query("SELECT * FROM comparisons ORDER BY created_at, id", &[])
            .await?;
        let comparisons = rows
            .iter()
            .map(Self::comparison_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let passive_events = self
            .client
            .query("SELECT * FROM passive_events ORDER BY id", &[])
            .await?
            .iter()
            .map(Self::passive_event_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            items = items.len(),
            ratings = ratings.len(),
            comparisons = comparisons.len(),
            "Engine state fetched"
        );

        Ok(EngineSnapshot {
            parameter_sets,
            items,
            relationships,
            ratings,
            comparisons,
            passive_events
        })
    }

    /// Blocks until no other client holds the engine state. Hold it from
    /// `load_snapshot` until `save_snapshot` has committed so that
    /// concurrent commands cannot overwrite each other's work.
    pub async fn lock_state(&self) -> Result<(), DbError> {
        debug!("Waiting for the engine state lock...");
        self.client.execute("SELECT pg_advisory_lock($1)", &[&STATE_LOCK_KEY]).await?;
        Ok(())
    }

    pub async fn unlock_state(&self) -> Result<(), DbError> {
        self.client
            .execute("SELECT pg_advisory_unlock($1)", &[&STATE_LOCK_KEY])
            .await?;
        Ok(())
    }

    /// Writes `snapshot` in one transaction. Rows are inserted or updated in
    /// place; comparisons and passive events are never deleted. The only
    /// removal is the rating of an item that has since become an alias.
    pub async fn save_snapshot(&mut self, snapshot: &EngineSnapshot) -> Result<(), DbError> {
        let transaction = self.client.transaction().await?;

        // Id order closes the previous active set before the next one opens
        let statement = transaction
            .prepare(
                "INSERT INTO parameter_sets (id, default_rating, default_deviation, default_volatility, \
                system_constant, score_strong_a, score_slight_a, score_tie, score_slight_b, score_strong_b, \
                reason, active_from, active_until) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                ON CONFLICT (id) DO UPDATE SET active_until = EXCLUDED.active_until"
            )
            .await?;
        for set in snapshot.parameter_sets.iter().sorted_by_key(|s| s.id) {
            let v = &set.values;
            let s = &v.outcome_scores;
            transaction
                .execute(
                    &statement,
                    &[
                        &set.id,
                        &v.default_rating,
                        &v.default_deviation,
                        &v.default_volatility,
                        &v.system_constant,
                        &s.strong_a,
                        &s.slight_a,
                        &s.tie,
                        &s.slight_b,
                        &s.strong_b,
                        &set.reason,
                        &set.active_from,
                        &set.active_until
                    ]
                )
                .await?;
        }

        // Canonical items first so alias references resolve
        let statement = transaction
            .prepare(
                "INSERT INTO items (id, title, canonical_id, created_at) VALUES ($1, $2, $3, $4) \
                ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, canonical_id = EXCLUDED.canonical_id"
            )
            .await?;
        for item in snapshot.items.iter().sorted_by_key(|i| (i.canonical_id.is_some(), i.id)) {
            transaction
                .execute(&statement, &[&item.id, &item.title, &item.canonical_id, &item.created_at])
                .await?;
        }

        let statement = transaction
            .prepare(
                "INSERT INTO item_relationships (item_a, item_b, kind, created_at) VALUES ($1, $2, $3, $4) \
                ON CONFLICT (item_a, item_b, kind) DO NOTHING"
            )
            .await?;
        for relationship in &snapshot.relationships {
            transaction
                .execute(
                    &statement,
                    &[
                        &relationship.item_a,
                        &relationship.item_b,
                        &(relationship.kind as i16),
                        &relationship.created_at
                    ]
                )
                .await?;
        }

        let rated = snapshot.ratings.iter().map(|r| r.item_id).collect_vec();
        let removed = transaction
            .execute("DELETE FROM ratings WHERE NOT (item_id = ANY($1))", &[&rated])
            .await?;
        if removed > 0 {
            info!(removed, "Dropped ratings of aliased items");
        }

        let statement = transaction
            .prepare(
                "INSERT INTO ratings (item_id, rating, deviation, volatility, comparisons, wins, losses, draws, \
                last_compared, initialized_with) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                ON CONFLICT (item_id) DO UPDATE SET rating = EXCLUDED.rating, deviation = EXCLUDED.deviation, \
                volatility = EXCLUDED.volatility, comparisons = EXCLUDED.comparisons, wins = EXCLUDED.wins, \
                losses = EXCLUDED.losses, draws = EXCLUDED.draws, last_compared = EXCLUDED.last_compared, \
                initialized_with = EXCLUDED.initialized_with"
            )
            .await?;
        for rating in &snapshot.ratings {
            transaction
                .execute(
                    &statement,
                    &[
                        &rating.item_id,
                        &rating.state.rating,
                        &rating.state.deviation,
                        &rating.state.volatility,
                        &rating.comparisons,
                        &rating.wins,
                        &rating.losses,
                        &rating.draws,
                        &rating.last_compared,
                        &rating.initialized_with
                    ]
                )
                .await?;
        }

        // Only the validity of a stored comparison can change
        let statement = transaction
            .prepare(
                "INSERT INTO comparisons (id, item_a, item_b, outcome_level, outcome, parameter_set_id, \
                a_before_rating, a_before_deviation, a_before_volatility, \
                a_after_rating, a_after_deviation, a_after_volatility, \
                b_before_rating, b_before_deviation, b_before_volatility, \
                b_after_rating, b_after_deviation, b_after_volatility, \
                expected_outcome, context, is_valid, created_at, invalidated_at, revote_of) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
                $19, $20, $21, $22, $23, $24) \
                ON CONFLICT (id) DO UPDATE SET is_valid = EXCLUDED.is_valid, invalidated_at = EXCLUDED.invalidated_at"
            )
            .await?;
        let bar = progress_bar(snapshot.comparisons.len() as u64, "Saving comparisons".to_string());
        // Id order keeps revote_of references pointing backwards
        for comparison in snapshot.comparisons.iter().sorted_by_key(|c| c.id) {
            let context = serde_json::to_string(&comparison.context)?;
            let level = comparison.outcome_level as i16;
            let values: &[&(dyn ToSql + Sync)] = &[
                &comparison.id,
                &comparison.item_a,
                &comparison.item_b,
                &level,
                &comparison.outcome,
                &comparison.parameter_set_id,
                &comparison.a_before.rating,
                &comparison.a_before.deviation,
                &comparison.a_before.volatility,
                &comparison.a_after.rating,
                &comparison.a_after.deviation,
                &comparison.a_after.volatility,
                &comparison.b_before.rating,
                &comparison.b_before.deviation,
                &comparison.b_before.volatility,
                &comparison.b_after.rating,
                &comparison.b_after.deviation,
                &comparison.b_after.volatility,
                &comparison.expected_outcome,
                &context,
                &comparison.is_valid,
                &comparison.created_at,
                &comparison.invalidated_at,
                &comparison.revote_of
            ];

            transaction.execute(&statement, values).await?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        let statement = transaction
            .prepare(
                "INSERT INTO passive_events (id, item_id, canonical_id, kind, listened_ms, position_ms, context, \
                recorded_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (id) DO NOTHING"
            )
            .await?;
        for event in &snapshot.passive_events {
            transaction
                .execute(
                    &statement,
                    &[
                        &event.id,
                        &event.item_id,
                        &event.canonical_id,
                        &(event.details.kind as i16),
                        &event.details.listened_ms,
                        &event.details.position_ms,
                        &event.details.context,
                        &event.recorded_at
                    ]
                )
                .await?;
        }

        transaction.commit().await?;
        info!(
            items = snapshot.items.len(),
            comparisons = snapshot.comparisons.len(),
            "Engine state saved"
        );

        Ok(())
    }

    fn parameter_set_from_row(row: &Row) -> ParameterSet {
        ParameterSet {
            id: row.get("id"),
            values: ParameterValues {
                default_rating: row.get("default_rating"),
                default_deviation: row.get("default_deviation"),
                default_volatility: row.get("default_volatility"),
                system_constant: row.get("system_constant"),
                outcome_scores: OutcomeScores {
                    strong_a: row.get("score_strong_a"),
                    slight_a: row.get("score_slight_a"),
                    tie: row.get("score_tie"),
                    slight_b: row.get("score_slight_b"),
                    strong_b: row.get("score_strong_b")
                }
            },
            reason: row.get("reason"),
            active_from: row.get("active_from"),
            active_until: row.get("active_until")
        }
    }

    fn item_from_row(row: &Row) -> Item {
        Item {
            id: row.get("id"),
            title: row.get("title"),
            canonical_id: row.get("canonical_id"),
            created_at: row.get("created_at")
        }
    }

    fn relationship_from_row(row: &Row) -> Result<ItemRelationship, DbError> {
        let kind = row.get::<_, i16>("kind");

        Ok(ItemRelationship {
            item_a: row.get("item_a"),
            item_b: row.get("item_b"),
            kind: RelationshipKind::try_from(kind as i32).map_err(|_| DbError::decode("kind", kind as i64))?,
            created_at: row.get("created_at")
        })
    }

    fn rating_from_row(row: &Row) -> Rating {
        Rating {
            item_id: row.get("item_id"),
            state: RatingState::new(row.get("rating"), row.get("deviation"), row.get("volatility")),
            comparisons: row.get("comparisons"),
            wins: row.get("wins"),
            losses: row.get("losses"),
            draws: row.get("draws"),
            last_compared: row.get("last_compared"),
            initialized_with: row.get("initialized_with")
        }
    }

    fn comparison_from_row(row: &Row) -> Result<Comparison, DbError> {
        let level = row.get::<_, i16>("outcome_level");
        let context = row.get::<_, String>("context");

        Ok(Comparison {
            id: row.get("id"),
            item_a: row.get("item_a"),
            item_b: row.get("item_b"),
            outcome_level: OutcomeLevel::try_from(level as i32)
                .map_err(|_| DbError::decode("outcome_level", level as i64))?,
            outcome: row.get("outcome"),
            parameter_set_id: row.get("parameter_set_id"),
            a_before: Self::state_from_row(row, "a_before"),
            a_after: Self::state_from_row(row, "a_after"),
            b_before: Self::state_from_row(row, "b_before"),
            b_after: Self::state_from_row(row, "b_after"),
            expected_outcome: row.get("expected_outcome"),
            context: serde_json::from_str(&context)?,
            is_valid: row.get("is_valid"),
            created_at: row.get("created_at"),
            invalidated_at: row.get("invalidated_at"),
            revote_of: row.get("revote_of")
        })
    }

    fn state_from_row(row: &Row, prefix: &str) -> RatingState {
        RatingState::new(
            row.get(format!("{}_rating", prefix).as_str()),
            row.get(format!("{}_deviation", prefix).as_str()),
            row.get(format!("{}_volatility", prefix).as_str())
        )
    }

    fn passive_event_from_row(row: &Row) -> Result<PassiveEvent, DbError> {
        let kind = row.get::<_, i16>("kind");

        Ok(PassiveEvent {
            id: row.get("id"),
            item_id: row.get("item_id"),
            canonical_id: row.get("canonical_id"),
            details: PassiveEventDetails {
                kind: PassiveEventKind::try_from(kind as i32).map_err(|_| DbError::decode("kind", kind as i64))?,
                listened_ms: row.get("listened_ms"),
                position_ms: row.get("position_ms"),
                context: row.get("context")
            },
            recorded_at: row.get("recorded_at")
        })
    }
}
