//! Live schema introspection of a MySQL database.
//!
//! Entity names are listed from `information_schema.TABLES`, then one
//! `SHOW CREATE TABLE|VIEW` query per entity fetches the authoritative
//! statement. Fetches run concurrently, at most [`MAX_CONCURRENT_FETCHES`] at a
//! time. The first failing fetch cancels the others and is returned once every
//! worker has stopped.

use crate::dsn::ConnectionTarget;
use crate::error::ExecError;
use schemadiff_engine::{quote_identifier, EntityKind};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on in-flight `SHOW CREATE` queries, and on pooled connections.
pub const MAX_CONCURRENT_FETCHES: usize = 20;

const ENTITY_NAMES_QUERY: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, CAST(TABLE_TYPE AS CHAR) AS table_type \
     FROM information_schema.TABLES WHERE TABLE_SCHEMA = ?";

/// Read the CREATE statement of every table and view in the target database,
/// or of the single entity named by the target.
pub async fn read_database_schema(target: &ConnectionTarget) -> Result<Vec<String>, ExecError> {
    if target.database.is_empty() {
        return Err(ExecError::InvalidArgument(format!(
            "connection string must name a database: {target}"
        )));
    }

    let started_at = Instant::now();
    let pool = MySqlPoolOptions::new()
        .max_connections(MAX_CONCURRENT_FETCHES as u32)
        .connect_with(target.connect_options())
        .await
        .map_err(|err| ExecError::database(format!("connecting to {}", target.address), err))?;

    let result = async {
        let entities = list_entities(&pool, target).await?;
        debug!(database = %target.database, entities = entities.len(), "listed entities");
        fetch_create_statements(&pool, &target.database, entities).await
    }
    .await;
    pool.close().await;

    if let Ok(statements) = &result {
        debug!(
            database = %target.database,
            statements = statements.len(),
            elapsed = ?started_at.elapsed(),
            "introspected database"
        );
    }
    result
}

/// Names and kinds of the entities to fetch.
async fn list_entities(
    pool: &MySqlPool,
    target: &ConnectionTarget,
) -> Result<Vec<(String, EntityKind)>, ExecError> {
    let mut sql = ENTITY_NAMES_QUERY.to_string();
    if target.entity.is_some() {
        sql.push_str(" AND TABLE_NAME = ?");
    }

    let mut query = sqlx::query(&sql).bind(target.database.as_str());
    if let Some(entity) = &target.entity {
        query = query.bind(entity.as_str());
    }
    let context = || {
        format!(
            "reading {} table and view names",
            quote_identifier(&target.database)
        )
    };
    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|err| ExecError::database(context(), err))?;

    rows.iter()
        .map(|row| {
            let name: String = row
                .try_get("table_name")
                .map_err(|err| ExecError::database(context(), err))?;
            let table_type: String = row
                .try_get("table_type")
                .map_err(|err| ExecError::database(context(), err))?;
            Ok((name, entity_kind(&table_type)))
        })
        .collect()
}

fn entity_kind(table_type: &str) -> EntityKind {
    if table_type == "BASE TABLE" {
        EntityKind::Table
    } else {
        EntityKind::View
    }
}

/// `SHOW CREATE TABLE|VIEW` query for one entity, both name parts quoted.
pub fn show_create_query(database: &str, name: &str, kind: EntityKind) -> String {
    format!(
        "SHOW CREATE {kind} {}.{}",
        quote_identifier(database),
        quote_identifier(name)
    )
}

async fn show_create(
    pool: &MySqlPool,
    database: &str,
    name: &str,
    kind: EntityKind,
) -> Result<String, ExecError> {
    let sql = show_create_query(database, name, kind);
    let context = || format!("showing CREATE statement for {}", quote_identifier(name));

    let row = sqlx::query(&sql)
        .fetch_optional(pool)
        .await
        .map_err(|err| ExecError::database(context(), err))?
        .ok_or_else(|| ExecError::database(context(), sqlx::Error::RowNotFound))?;
    row.try_get::<String, _>(1)
        .map_err(|err| ExecError::database(context(), err))
}

async fn fetch_create_statements(
    pool: &MySqlPool,
    database: &str,
    entities: Vec<(String, EntityKind)>,
) -> Result<Vec<String>, ExecError> {
    fetch_bounded(entities, |name, kind| {
        let pool = pool.clone();
        let database = database.to_string();
        async move {
            let create = show_create(&pool, &database, &name, kind).await?;
            debug!(entity = %name, %kind, "fetched CREATE statement");
            Ok(create)
        }
    })
    .await
}

/// Run `fetch` for every entity with at most [`MAX_CONCURRENT_FETCHES`] in
/// flight. A fetch future does nothing until it holds a permit. The first
/// failure cancels queued and running siblings and is returned once every
/// worker has stopped.
async fn fetch_bounded<F, Fut>(
    entities: Vec<(String, EntityKind)>,
    mut fetch: F,
) -> Result<Vec<String>, ExecError>
where
    F: FnMut(String, EntityKind) -> Fut,
    Fut: Future<Output = Result<String, ExecError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
    let cancel = CancellationToken::new();
    let statements = Arc::new(Mutex::new(Vec::with_capacity(entities.len())));
    let mut tasks = JoinSet::new();

    for (name, kind) in entities {
        let work = fetch(name, kind);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let statements = Arc::clone(&statements);

        tasks.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                },
            };
            let create = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                result = work => result?,
            };
            statements.lock().await.push(create);
            Ok::<(), ExecError>(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(ExecError::from).and_then(|result| result);
        if let Err(err) = outcome {
            if first_error.is_none() {
                warn!(error = %err, "introspection failed, cancelling remaining fetches");
                cancel.cancel();
                first_error = Some(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let mut statements = statements.lock().await;
    Ok(std::mem::take(&mut *statements))
}
