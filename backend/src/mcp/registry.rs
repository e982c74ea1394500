//! Static capability registry.
//!
//! Every tool and resource the server offers is a variant here; names,
//! descriptors and URI matching are resolved at compile time.

use serde_json::json;
use tether_types::mcp::{ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor};

/// Tools exposed through `tools/list` and `tools/call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// List databases and their tables on the configured PostgreSQL server.
    ListDatabases,
    /// Fetch a Pokemon from the PokeAPI.
    FetchPokemon,
}

impl Tool {
    pub const ALL: &'static [Tool] = &[Tool::ListDatabases, Tool::FetchPokemon];

    pub fn name(self) -> &'static str {
        match self {
            Tool::ListDatabases => "listDatabasesAndTables",
            Tool::FetchPokemon => "fetch-pokemon",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Self::ALL.iter().copied().find(|tool| tool.name() == name)
    }

    pub fn descriptor(self) -> ToolDescriptor {
        match self {
            Tool::ListDatabases => ToolDescriptor {
                name: self.name().to_string(),
                title: "List databases and tables".to_string(),
                description: "Lists all databases and tables on the configured PostgreSQL server"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "connectToDb": {
                            "type": "boolean",
                            "description": "Whether to connect to the database at all"
                        }
                    },
                    "required": ["connectToDb"]
                }),
            },
            Tool::FetchPokemon => ToolDescriptor {
                name: self.name().to_string(),
                title: "Pokemon Fetcher".to_string(),
                description: "Get Pokemon data".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Pokemon name or national dex number"
                        }
                    },
                    "required": ["id"]
                }),
            },
        }
    }
}

/// Resources exposed through `resources/list`, `resources/templates/list`
/// and `resources/read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Static application configuration at `config://app`.
    AppConfig,
    /// Per-user profile at `users://{userId}/profile`.
    UserProfile,
}

/// A resource matched against a concrete URI, with its template arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedResource {
    AppConfig,
    UserProfile { user_id: String },
}

const APP_CONFIG_URI: &str = "config://app";
const USER_PROFILE_PREFIX: &str = "users://";
const USER_PROFILE_SUFFIX: &str = "/profile";

impl Resource {
    pub const ALL: &'static [Resource] = &[Resource::AppConfig, Resource::UserProfile];

    pub fn name(self) -> &'static str {
        match self {
            Resource::AppConfig => "config",
            Resource::UserProfile => "user-profile",
        }
    }

    /// Descriptor for `resources/list`, if this is a static resource.
    pub fn descriptor(self) -> Option<ResourceDescriptor> {
        match self {
            Resource::AppConfig => Some(ResourceDescriptor {
                uri: APP_CONFIG_URI.to_string(),
                name: self.name().to_string(),
                title: "Application Config".to_string(),
                description: "Application configuration data".to_string(),
                mime_type: Some("text/plain".to_string()),
            }),
            Resource::UserProfile => None,
        }
    }

    /// Descriptor for `resources/templates/list`, if this is a template.
    pub fn template_descriptor(self) -> Option<ResourceTemplateDescriptor> {
        match self {
            Resource::AppConfig => None,
            Resource::UserProfile => Some(ResourceTemplateDescriptor {
                uri_template: format!("{USER_PROFILE_PREFIX}{{userId}}{USER_PROFILE_SUFFIX}"),
                name: self.name().to_string(),
                title: "User Profile".to_string(),
                description: "User profile information".to_string(),
                mime_type: None,
            }),
        }
    }

    /// Match a concrete URI against the registered resources.
    pub fn resolve(uri: &str) -> Option<ResolvedResource> {
        if uri == APP_CONFIG_URI {
            return Some(ResolvedResource::AppConfig);
        }
        let user_id = uri
            .strip_prefix(USER_PROFILE_PREFIX)?
            .strip_suffix(USER_PROFILE_SUFFIX)?;
        if user_id.is_empty() || user_id.contains('/') {
            return None;
        }
        Some(ResolvedResource::UserProfile {
            user_id: user_id.to_string(),
        })
    }
}
