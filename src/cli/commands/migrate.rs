use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::database::schema;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let (db, _) = connect().await?;
    db.migrate().await?;
    db.close().await;

    output_success(
        &output_format,
        "Database schema is up to date",
        Some(json!({ "statements": schema::STATEMENTS.len() })),
    )
}
