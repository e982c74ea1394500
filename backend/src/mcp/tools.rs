//! Tool implementations.

use super::error::{CapabilityError, Result};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tether_types::mcp::CallToolResult;
use tracing::{debug, info};

/// Arguments of `listDatabasesAndTables`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDatabasesArgs {
    pub connect_to_db: bool,
}

/// Arguments of `fetch-pokemon`.
#[derive(Debug, Deserialize)]
pub struct FetchPokemonArgs {
    pub id: String,
}

/// One database and the tables visible in it.
#[derive(Debug, Serialize, PartialEq)]
pub struct DatabaseInfo {
    pub database: String,
    pub tables: Vec<String>,
}

/// Parse tool arguments, mapping failures to an invalid-params error.
pub fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| CapabilityError::InvalidArguments(e.to_string()))
}

/// List every connectable database and its user tables.
///
/// Each database is inspected over its own connection, concurrently.
pub async fn list_databases(
    database_url: Option<&str>,
    args: ListDatabasesArgs,
) -> Result<CallToolResult> {
    let url = database_url.ok_or(CapabilityError::MissingDatabaseUrl)?;
    if !args.connect_to_db {
        return Ok(CallToolResult::default());
    }

    let options: PgConnectOptions = url.parse()?;
    let mut conn = options.connect().await?;
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT datname FROM pg_database WHERE NOT datistemplate AND datallowconn ORDER BY datname",
    )
    .fetch_all(&mut conn)
    .await?;
    conn.close().await?;
    info!("MCP: Found {} database(s)", names.len());

    let infos = try_join_all(
        names
            .into_iter()
            .map(|name| list_tables(options.clone().database(&name), name)),
    )
    .await?;

    Ok(CallToolResult::text(serde_json::to_string(&infos)?))
}

async fn list_tables(options: PgConnectOptions, database: String) -> Result<DatabaseInfo> {
    let mut conn = options.connect().await?;
    let tables: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT table_schema || '.' || table_name
        FROM information_schema.tables
        WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
        ORDER BY 1
        "#,
    )
    .fetch_all(&mut conn)
    .await?;
    conn.close().await?;
    debug!("MCP: Database {} has {} table(s)", database, tables.len());
    Ok(DatabaseInfo { database, tables })
}

/// Fetch one Pokemon from `<base_url>/api/v2/pokemon/<id>`.
pub async fn fetch_pokemon(
    client: &reqwest::Client,
    base_url: &str,
    args: FetchPokemonArgs,
) -> Result<CallToolResult> {
    let id = args.id.trim().to_lowercase();
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(CapabilityError::InvalidArguments(format!(
            "invalid Pokemon id: {:?}",
            args.id
        )));
    }

    let url = format!("{}/api/v2/pokemon/{}", base_url.trim_end_matches('/'), id);
    info!("MCP: Fetching {}", url);
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CapabilityError::Upstream {
            url,
            status: status.as_u16(),
        });
    }
    let data: Value = response.json().await?;

    Ok(CallToolResult::text(serde_json::to_string(&data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::get, Json, Router};
    use serde_json::json;
    use tether_types::mcp::Content;

    async fn spawn_fake_pokeapi() -> String {
        let app = Router::new().route(
            "/api/v2/pokemon/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "pikachu" {
                    Ok(Json(json!({ "id": 25, "name": "pikachu" })))
                } else {
                    Err(axum::http::StatusCode::NOT_FOUND)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_list_databases_without_url_fails() {
        let err = list_databases(None, ListDatabasesArgs { connect_to_db: true })
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::MissingDatabaseUrl));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_list_databases_skips_connection_when_asked() {
        let result = list_databases(
            Some("postgresql://nobody@127.0.0.1:1/none"),
            ListDatabasesArgs {
                connect_to_db: false,
            },
        )
        .await
        .unwrap();
        assert!(result.content.is_empty());
    }

    #[test]
    fn test_parse_args_rejects_wrong_shape() {
        let err = parse_args::<ListDatabasesArgs>(json!({ "connectToDb": "yes" })).unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_fetch_pokemon() {
        let base = spawn_fake_pokeapi().await;
        let client = reqwest::Client::new();

        let result = fetch_pokemon(
            &client,
            &base,
            FetchPokemonArgs {
                id: "Pikachu".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(!result.is_error);
        let Content::Text { text } = &result.content[0];
        let data: Value = serde_json::from_str(text).unwrap();
        assert_eq!(data["id"], 25);
    }

    #[tokio::test]
    async fn test_fetch_pokemon_upstream_error() {
        let base = spawn_fake_pokeapi().await;
        let client = reqwest::Client::new();

        let err = fetch_pokemon(
            &client,
            &base,
            FetchPokemonArgs {
                id: "missingno".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CapabilityError::Upstream { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_pokemon_rejects_path_characters() {
        let client = reqwest::Client::new();
        let err = fetch_pokemon(
            &client,
            "http://127.0.0.1:1",
            FetchPokemonArgs {
                id: "../admin".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_client_error());
    }
}
