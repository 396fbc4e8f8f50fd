//! DDL templates for log keyspaces.
//!
//! Templates carry `{keyspace}` and `{gc_grace_seconds}` placeholders. Table
//! creation, retention alteration and index creation are separate
//! statements and are always issued in that order: the alteration and the
//! index both need the table.

use crate::constants::{
    BASE_LOG_INDEX, BASE_LOG_TABLE, DEFAULT_KEYSPACE, GC_GRACE_SECONDS, LOG_META_INDEX,
    LOG_META_TABLE,
};
use logstore_core::{Consistency, KeyspaceConfig, SchemaObject, Statement};

pub const BASE_LOG_CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS {keyspace}.base_log (
    source text,
    id text,
    stream text,
    time_bucket bigint,
    timestamp bigint,
    offset bigint,
    content blob,
    level text,
    request_id text,
    PRIMARY KEY ((source, id, stream, time_bucket), timestamp, offset)
) WITH CLUSTERING ORDER BY (timestamp DESC, offset DESC)
    AND compaction = {'class': 'org.apache.cassandra.db.compaction.TimeWindowCompactionStrategy', 'compaction_window_unit': 'HOURS', 'compaction_window_size': '4'}
    AND gc_grace_seconds = {gc_grace_seconds}";

pub const BASE_LOG_ALTER_GC_GRACE: &str =
    "ALTER TABLE {keyspace}.base_log WITH gc_grace_seconds = {gc_grace_seconds}";

pub const BASE_LOG_CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS base_log_request_id_idx ON {keyspace}.base_log (request_id)";

pub const LOG_META_CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS {keyspace}.base_log_meta (
    source text,
    id text,
    tags map<text, text>,
    PRIMARY KEY ((source, id))
) WITH compaction = {'class': 'org.apache.cassandra.db.compaction.SizeTieredCompactionStrategy'}
    AND gc_grace_seconds = {gc_grace_seconds}";

pub const LOG_META_CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS base_log_meta_tags_idx ON {keyspace}.base_log_meta (ENTRIES(tags))";

/// Fill a template for `keyspace`.
pub fn render(template: &str, keyspace: &str) -> String {
    template
        .replace("{keyspace}", keyspace)
        .replace("{gc_grace_seconds}", &GC_GRACE_SECONDS.to_string())
}

fn statement(template: &str, target: SchemaObject) -> Statement {
    let cql = render(template, target.keyspace());
    Statement::new(cql, target).with_consistency(Consistency::All)
}

/// Table, retention alteration and index for a tenant keyspace, in order.
pub fn tenant_table_statements(keyspace: &str) -> Vec<Statement> {
    vec![
        statement(
            BASE_LOG_CREATE_TABLE,
            SchemaObject::Table {
                keyspace: keyspace.to_string(),
                table: BASE_LOG_TABLE.to_string(),
            },
        ),
        statement(
            BASE_LOG_ALTER_GC_GRACE,
            SchemaObject::TableRetention {
                keyspace: keyspace.to_string(),
                table: BASE_LOG_TABLE.to_string(),
                gc_grace_seconds: GC_GRACE_SECONDS,
            },
        ),
        statement(
            BASE_LOG_CREATE_INDEX,
            SchemaObject::Index {
                keyspace: keyspace.to_string(),
                table: BASE_LOG_TABLE.to_string(),
                index: BASE_LOG_INDEX.to_string(),
            },
        ),
    ]
}

/// Everything the default keyspace needs: the tenant tables plus the
/// metadata table and its index.
pub fn default_schema_statements() -> Vec<Statement> {
    let mut stmts = tenant_table_statements(DEFAULT_KEYSPACE);
    stmts.push(statement(
        LOG_META_CREATE_TABLE,
        SchemaObject::Table {
            keyspace: DEFAULT_KEYSPACE.to_string(),
            table: LOG_META_TABLE.to_string(),
        },
    ));
    stmts.push(statement(
        LOG_META_CREATE_INDEX,
        SchemaObject::Index {
            keyspace: DEFAULT_KEYSPACE.to_string(),
            table: LOG_META_TABLE.to_string(),
            index: LOG_META_INDEX.to_string(),
        },
    ));
    stmts
}

/// `CREATE KEYSPACE` text for a keyspace config, for logs and CQL drivers.
pub fn create_keyspace_cql(config: &KeyspaceConfig) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': '{}', 'replication_factor': {}}}",
        config.name, config.replication.class, config.replication.factor
    )
}
