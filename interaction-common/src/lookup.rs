use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::info;

use crate::error::LookupError;

/// Maps from the values kiosks send to the surrogate ids of the reference tables.
///
/// Built once per ingestion session and never mutated afterwards: reference rows added while a
/// session runs are only picked up by the next one. A missing key is the ordinary
/// "unrecognised value" case, not an inconsistency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceLookup {
    exhibition_ids: HashMap<i64, i32>,
    rating_ids: HashMap<i64, i32>,
    request_ids: HashMap<i64, i32>,
}

impl ReferenceLookup {
    pub fn new(
        exhibition_ids: HashMap<i64, i32>,
        rating_ids: HashMap<i64, i32>,
        request_ids: HashMap<i64, i32>,
    ) -> Self {
        Self {
            exhibition_ids,
            rating_ids,
            request_ids,
        }
    }

    /// Load the reference tables for `museum` over the session's connection.
    ///
    /// An unknown museum is an error, a museum without exhibitions is not: every site simply
    /// resolves as unrecognised.
    pub async fn load(conn: &mut PgConnection, museum: &str) -> Result<Self, LookupError> {
        let museum_id: Option<i32> =
            sqlx::query_scalar("SELECT museum_id::INT FROM museum WHERE museum_name = $1")
                .bind(museum)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|error| LookupError::Query {
                    query: "museum",
                    error,
                })?;
        let museum_id = museum_id.ok_or_else(|| LookupError::UnknownMuseum(museum.to_owned()))?;

        let exhibitions: Vec<(String, i32)> = sqlx::query_as(
            "SELECT public_id, exhibition_id::INT FROM exhibition WHERE museum_id = $1",
        )
        .bind(museum_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|error| LookupError::Query {
            query: "exhibition",
            error,
        })?;

        let exhibition_ids = exhibitions
            .into_iter()
            .map(|(public_id, exhibition_id)| match exhibition_key(&public_id) {
                Some(key) => Ok((key, exhibition_id)),
                None => Err(LookupError::MalformedPublicId(public_id)),
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let rating_ids = load_value_ids(
            conn,
            "rating",
            "SELECT rating_value::BIGINT, rating_id::INT FROM rating",
        )
        .await?;
        let request_ids = load_value_ids(
            conn,
            "request",
            "SELECT request_value::BIGINT, request_id::INT FROM request",
        )
        .await?;

        info!(
            museum,
            exhibitions = exhibition_ids.len(),
            ratings = rating_ids.len(),
            requests = request_ids.len(),
            "loaded reference lookup"
        );

        Ok(Self::new(exhibition_ids, rating_ids, request_ids))
    }

    pub fn exhibition_id(&self, site: i64) -> Option<i32> {
        self.exhibition_ids.get(&site).copied()
    }

    pub fn rating_id(&self, value: i64) -> Option<i32> {
        self.rating_ids.get(&value).copied()
    }

    pub fn request_id(&self, value: i64) -> Option<i32> {
        self.request_ids.get(&value).copied()
    }

    pub fn exhibition_ids(&self) -> &HashMap<i64, i32> {
        &self.exhibition_ids
    }

    pub fn rating_ids(&self) -> &HashMap<i64, i32> {
        &self.rating_ids
    }

    pub fn request_ids(&self) -> &HashMap<i64, i32> {
        &self.request_ids
    }
}

async fn load_value_ids(
    conn: &mut PgConnection,
    query: &'static str,
    sql: &'static str,
) -> Result<HashMap<i64, i32>, LookupError> {
    let rows: Vec<(i64, i32)> = sqlx::query_as(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|error| LookupError::Query { query, error })?;

    Ok(rows.into_iter().collect())
}

/// The site number kiosks report is the numeric component after the last `_` of an
/// exhibition's public id, so `EXH_04` is site 4.
pub fn exhibition_key(public_id: &str) -> Option<i64> {
    let suffix = public_id.rsplit('_').next()?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
