//! Template, column, rule and access-grant readers

use anyhow::{Context, Result, bail};
use sqlx::SqlitePool;

/// An active template and the physical table its loads land in
#[derive(Debug, Clone)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub table_name: String,
}

/// One active column of a template, in declared order
#[derive(Debug, Clone)]
pub struct TemplateColumn {
    pub id: i64,
    pub name: String,
    pub data_type: String,
    pub position: i64,
}

/// Get an active template by id
pub async fn get_active_template(pool: &SqlitePool, template_id: i64) -> Result<Option<Template>> {
    let row: Option<(i64, String, String)> = sqlx::query_as(
        "SELECT id, name, table_name FROM templates
         WHERE id = ? AND is_active = 1",
    )
    .bind(template_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get template")?;

    Ok(row.map(|(id, name, table_name)| Template {
        id,
        name,
        table_name,
    }))
}

/// Get the active columns of a template in declared order
pub async fn get_active_columns(
    pool: &SqlitePool,
    template_id: i64,
) -> Result<Vec<TemplateColumn>> {
    let rows: Vec<(i64, String, String, i64)> = sqlx::query_as(
        "SELECT id, name, data_type, position FROM template_columns
         WHERE template_id = ? AND is_active = 1
         ORDER BY position",
    )
    .bind(template_id)
    .fetch_all(pool)
    .await
    .context("Failed to get template columns")?;

    Ok(rows
        .into_iter()
        .map(|(id, name, data_type, position)| TemplateColumn {
            id,
            name,
            data_type,
            position,
        })
        .collect())
}

/// Get the rule payloads linked to a column
///
/// A linked rule that is missing or inactive is a configuration error, not
/// something to skip silently.
pub async fn get_column_rules(
    pool: &SqlitePool,
    column_id: i64,
) -> Result<Vec<serde_json::Value>> {
    let links: Vec<(i64,)> = sqlx::query_as(
        "SELECT rule_id FROM template_column_rules
         WHERE column_id = ?
         ORDER BY rule_id",
    )
    .bind(column_id)
    .fetch_all(pool)
    .await
    .context("Failed to get column rule links")?;

    let mut payloads = Vec::with_capacity(links.len());
    for (rule_id,) in links {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT payload, is_active FROM rules WHERE id = ?")
                .bind(rule_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get rule")?;
        match row {
            None => bail!("La regla {} referenciada por la columna no existe", rule_id),
            Some((_, 0)) => bail!("La regla {} referenciada por la columna está inactiva", rule_id),
            Some((payload, _)) => {
                let parsed: serde_json::Value = serde_json::from_str(&payload)
                    .with_context(|| format!("Regla {} con payload malformado", rule_id))?;
                payloads.push(parsed);
            }
        }
    }
    Ok(payloads)
}

/// Check whether a user holds an active grant on a template
pub async fn user_has_access(pool: &SqlitePool, user_id: i64, template_id: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM template_user_access
         WHERE user_id = ? AND template_id = ? AND is_active = 1",
    )
    .bind(user_id)
    .bind(template_id)
    .fetch_optional(pool)
    .await
    .context("Failed to check template access")?;

    Ok(row.is_some())
}
