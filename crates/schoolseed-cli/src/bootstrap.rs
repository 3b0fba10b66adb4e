use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::info;

use schoolseed_generate::{Bootstrap, BootstrapError, Store};

/// Calls the backend's registration endpoint, which creates the testing
/// accounts in its own transaction.
#[derive(Debug, Clone)]
pub struct HttpBootstrap {
    client: Client,
    url: Url,
}

impl HttpBootstrap {
    pub fn new(url: Url) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Bootstrap for HttpBootstrap {
    async fn register_testing_users(&self, _store: &mut dyn Store) -> Result<(), BootstrapError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| BootstrapError::Transport(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(BootstrapError::Status {
                status: status.as_u16(),
            });
        }
        info!(url = %self.url, status = status.as_u16(), "testing accounts registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use schoolseed_generate::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const REGISTER_PATH: &str = "/register_testing_users";

    async fn registration_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REGISTER_PATH))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn endpoint(base: &str) -> Url {
        Url::parse(&format!("{base}{REGISTER_PATH}")).unwrap()
    }

    fn direct(url: Url) -> HttpBootstrap {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpBootstrap::with_client(client, url)
    }

    #[tokio::test]
    async fn created_status_counts_as_registered() {
        let server = registration_server(201).await;
        let mut store = MemoryStore::new();
        direct(endpoint(&server.uri()))
            .register_testing_users(&mut store)
            .await
            .unwrap();

        assert!(store.dataset().users.is_empty());
        server.verify().await;
    }

    #[tokio::test]
    async fn other_statuses_are_failures() {
        let server = registration_server(200).await;
        let err = direct(endpoint(&server.uri()))
            .register_testing_users(&mut MemoryStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Status { status: 200 }));
    }

    #[tokio::test]
    async fn unreachable_endpoints_are_transport_errors() {
        // Nothing can listen on port 0.
        let err = direct(endpoint("http://127.0.0.1:0"))
            .register_testing_users(&mut MemoryStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Transport(_)));
    }
}
