//! Stub OAuth client registry.
//!
//! There is no persistent client store. Every client id resolves to a
//! registration carrying the one configured redirect target.

use serde::Serialize;

use crate::types::ClientId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRegistration {
    pub client_id: ClientId,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClientRegistry {
    redirect_uri: String,
}

impl ClientRegistry {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn get_client(&self, client_id: &ClientId) -> ClientRegistration {
        ClientRegistration {
            client_id: client_id.clone(),
            redirect_uris: vec![self.redirect_uri.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_client_resolves_with_static_redirect() {
        let registry = ClientRegistry::new("http://localhost:3000/callback");
        let id = ClientId::from_string("client-42".to_string()).unwrap();
        let reg = registry.get_client(&id);
        assert_eq!(reg.client_id, id);
        assert_eq!(reg.redirect_uris, vec!["http://localhost:3000/callback".to_string()]);
    }
}
