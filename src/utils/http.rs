use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("telegram-studio-bot/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
});

// Generation calls override the request timeout per call; 30s covers the
// config fetch and operation polling.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
