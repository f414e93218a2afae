//! Read-only registry of configured target servers

use crate::error::{Error, Result};
use crate::types::ServerConfig;

/// Known target servers, looked up by name on every request
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: Vec<ServerConfig>,
}

impl ServerRegistry {
    pub fn new(servers: Vec<ServerConfig>) -> Self {
        Self { servers }
    }

    /// All servers in configuration order
    pub fn list(&self) -> &[ServerConfig] {
        &self.servers
    }

    /// Find a server by name
    pub fn find(&self, name: &str) -> Result<&ServerConfig> {
        self.servers
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::ServerNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ServerRegistry {
        ServerRegistry::new(vec![
            ServerConfig::new("pg1", "db1", "postgres", "postgres"),
            ServerConfig::new("pg2", "db2", "postgres", "postgres"),
        ])
    }

    #[test]
    fn test_list_keeps_order() {
        let names: Vec<_> = registry().list().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["pg1", "pg2"]);
    }

    #[test]
    fn test_find() {
        let registry = registry();
        assert_eq!(registry.find("pg2").unwrap().host, "db2");
        assert!(matches!(registry.find("pg9"), Err(Error::ServerNotFound(name)) if name == "pg9"));
    }

    #[test]
    fn test_empty() {
        let registry = ServerRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
