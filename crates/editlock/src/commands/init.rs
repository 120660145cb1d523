//! `editlock init`

use anyhow::Result;
use serde_json::json;

use super::print_json;
use crate::AppContext;

pub fn run(ctx: &AppContext) -> Result<i32> {
    tracing::info!(db_path = %ctx.config.store.db_path, "Lock table ready");
    print_json(&json!({
        "initialized": true,
        "db_path": ctx.config.store.db_path,
    }))?;
    Ok(0)
}
