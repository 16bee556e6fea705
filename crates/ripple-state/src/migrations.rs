//! SurrealDB schema initialization
//!
//! Every statement uses `IF NOT EXISTS`, so running this against a reopened
//! `surrealkv://` store is a no-op.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;
use crate::Result;

/// Initialize all Ripple tables.
pub(crate) async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Ripple schema");
    init_relationships_table(db).await?;
    init_receipts_table(db).await?;
    info!("Ripple schema initialization complete");
    Ok(())
}

/// `relationships` table.
///
/// ```text
/// TABLE relationships {
///   id:          relationships:<sha256(source, target, kind)>
///   source:      STRING (indexed)
///   target:      STRING (indexed)
///   kind:        STRING (depends-on | shared-library | same-domain | consumer-of-api)
///   metadata:    OBJECT
///   created_at:  DATETIME
/// }
/// ```
///
/// The record id already makes the triple unique; the composite UNIQUE index
/// guards rows written by other tooling.
async fn init_relationships_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing relationships table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS relationships SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_rel_source ON TABLE relationships COLUMNS source;
        DEFINE INDEX IF NOT EXISTS idx_rel_target ON TABLE relationships COLUMNS target;
        DEFINE INDEX IF NOT EXISTS idx_rel_triple ON TABLE relationships COLUMNS source, target, kind UNIQUE;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// `publication_receipts` table, one row per webhook delivery id.
async fn init_receipts_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing publication_receipts table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS publication_receipts SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_receipt_delivery ON TABLE publication_receipts COLUMNS delivery_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_receipt_pr ON TABLE publication_receipts COLUMNS repo, pr_id;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}
