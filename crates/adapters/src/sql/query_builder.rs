//! Typed construction of the candidate and tenant-count queries

use super::dialect::SqlDialect;
use super::table::{JobTable, TableName};
use fairq_core::{CandidateOrdering, CandidateQuery, FairnessError, QueueScope, SENTINEL_TENANT_KEY};

/// A bind parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

/// Rendered SQL text with its bind parameters in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

/// Collects binds while the SQL text is written left to right.
struct Params {
    dialect: SqlDialect,
    binds: Vec<SqlValue>,
}

impl Params {
    fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            binds: Vec::new(),
        }
    }

    fn push(&mut self, value: SqlValue) -> String {
        self.binds.push(value);
        self.dialect.placeholder(self.binds.len())
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            binds: self.binds,
        }
    }
}

/// Renders fair-share queries for one dialect and table layout.
#[derive(Debug, Clone)]
pub struct FairSqlBuilder {
    dialect: SqlDialect,
    jobs: JobTable,
    ranks: TableName,
}

impl FairSqlBuilder {
    pub fn new(dialect: SqlDialect, jobs: JobTable, ranks: TableName) -> Self {
        Self {
            dialect,
            jobs,
            ranks,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// Candidate ids for `query`, best first.
    ///
    /// Fair ordering left-joins the top-K ranks of the query's generation,
    /// collapses to one row per job and orders by priority, then rank with
    /// unranked tenants last, then randomly. Fails with a configuration
    /// error when the dialect cannot express that.
    pub fn candidates(&self, query: &CandidateQuery) -> Result<SqlStatement, FairnessError> {
        let d = self.dialect;
        let mut params = Params::new(d);

        let sql = match query.ordering {
            CandidateOrdering::Baseline => {
                let ready = self.ready_predicate(&mut params, &query.scope);
                let limit = params.push(SqlValue::Int(i64::from(query.limit)));
                format!(
                    "SELECT j.{id} FROM {jobs} j WHERE {ready} ORDER BY j.{priority} ASC, {tie} LIMIT {limit}",
                    id = d.quote(self.jobs.id),
                    jobs = self.jobs.name,
                    priority = d.quote(self.jobs.priority),
                    tie = d.random_fn().map(str::to_string).unwrap_or_else(|| format!("j.{} ASC", d.quote(self.jobs.id))),
                )
            }
            CandidateOrdering::Fair { generation, top_k } => {
                d.capabilities().require_fair_selection(&d.to_string())?;
                let random = d
                    .random_fn()
                    .ok_or_else(|| FairnessError::configuration("missing random ordering"))?;
                let any_priority = d
                    .any_value(&format!("j.{}", d.quote(self.jobs.priority)))
                    .ok_or_else(|| FairnessError::configuration("missing representative aggregate"))?;
                let any_rank = d
                    .any_value(&format!("r.{}", d.quote("rank")))
                    .ok_or_else(|| FairnessError::configuration("missing representative aggregate"))?;

                let generation = params.push(SqlValue::Int(generation.value()));
                let sentinel = params.push(SqlValue::Text(SENTINEL_TENANT_KEY.to_string()));
                let top_k = params.push(SqlValue::Int(i64::from(top_k)));
                let ready = self.ready_predicate(&mut params, &query.scope);
                let limit = params.push(SqlValue::Int(i64::from(query.limit)));

                let tenant = d.quote("tenant_key");
                let rank = d.quote("rank");
                format!(
                    "SELECT c.{id} FROM (\
                     SELECT j.{id} AS {id}, {any_priority} AS {priority}, {any_rank} AS fair_rank \
                     FROM {jobs} j \
                     LEFT JOIN (\
                     SELECT {tenant}, {rank} FROM {ranks} \
                     WHERE {gen_col} = {generation} AND {tenant} <> {sentinel} \
                     ORDER BY {rank} DESC, {tenant} ASC LIMIT {top_k}\
                     ) r ON r.{tenant} = j.{job_tenant} \
                     WHERE {ready} \
                     GROUP BY j.{id}\
                     ) c \
                     ORDER BY c.{priority} ASC, c.fair_rank IS NULL, c.fair_rank DESC, {random} \
                     LIMIT {limit}",
                    id = d.quote(self.jobs.id),
                    priority = d.quote(self.jobs.priority),
                    jobs = self.jobs.name,
                    ranks = self.ranks,
                    gen_col = d.quote("generation"),
                    job_tenant = d.quote(self.jobs.tenant_key),
                )
            }
        };

        Ok(params.finish(sql))
    }

    /// Busy and waiting counts per tenant. Failed jobs and jobs with a
    /// recorded error are left out of both counts.
    pub fn tenant_counts(&self, scope: &QueueScope) -> SqlStatement {
        let d = self.dialect;
        let mut params = Params::new(d);
        let tenant = d.quote(self.jobs.tenant_key);
        let locked_at = d.quote(self.jobs.locked_at);

        let mut sql = format!(
            "SELECT j.{tenant} AS tenant_key, COUNT(j.{locked_at}) AS busy, \
             COUNT(*) - COUNT(j.{locked_at}) AS waiting \
             FROM {jobs} j \
             WHERE j.{failed_at} IS NULL AND j.{last_error} IS NULL",
            jobs = self.jobs.name,
            failed_at = d.quote(self.jobs.failed_at),
            last_error = d.quote(self.jobs.last_error),
        );
        if let Some(filter) = self.queue_filter(&mut params, scope) {
            sql.push_str(" AND ");
            sql.push_str(&filter);
        }
        sql.push_str(&format!(" GROUP BY j.{}", tenant));

        params.finish(sql)
    }

    fn ready_predicate(&self, params: &mut Params, scope: &QueueScope) -> String {
        let d = self.dialect;
        let mut predicate = format!(
            "j.{locked_at} IS NULL AND j.{failed_at} IS NULL AND j.{run_at} <= CURRENT_TIMESTAMP",
            locked_at = d.quote(self.jobs.locked_at),
            failed_at = d.quote(self.jobs.failed_at),
            run_at = d.quote(self.jobs.run_at),
        );
        if let Some(filter) = self.queue_filter(params, scope) {
            predicate.push_str(" AND ");
            predicate.push_str(&filter);
        }
        predicate
    }

    fn queue_filter(&self, params: &mut Params, scope: &QueueScope) -> Option<String> {
        if scope.is_all() {
            return None;
        }
        let placeholders: Vec<String> = scope
            .queues()
            .map(|q| params.push(SqlValue::Text(q.to_string())))
            .collect();
        Some(format!(
            "j.{} IN ({})",
            self.dialect.quote(self.jobs.queue),
            placeholders.join(", ")
        ))
    }
}
