//! Resource implementations.

use super::registry::ResolvedResource;
use tether_types::mcp::{ReadResourceResult, ResourceContents};

/// Produce the contents of a resolved resource.
pub fn read(uri: &str, resource: &ResolvedResource) -> ReadResourceResult {
    let contents = match resource {
        ResolvedResource::AppConfig => ResourceContents {
            uri: uri.to_string(),
            mime_type: Some("text/plain".to_string()),
            text: "App configuration here!!".to_string(),
        },
        ResolvedResource::UserProfile { user_id } => ResourceContents {
            uri: uri.to_string(),
            mime_type: None,
            text: format!("Profile data for user {}!!", user_id),
        },
    };
    ReadResourceResult {
        contents: vec![contents],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::Resource;

    #[test]
    fn test_read_user_profile() {
        let uri = "users://ash/profile";
        let resolved = Resource::resolve(uri).unwrap();
        let result = read(uri, &resolved);
        assert_eq!(result.contents.len(), 1);
        assert_eq!(result.contents[0].uri, uri);
        assert_eq!(result.contents[0].text, "Profile data for user ash!!");
    }
}
