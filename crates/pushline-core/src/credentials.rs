// ── Credential provider seam ──
//
// The controller only needs to *read* a bearer token before each request.
// How that token is obtained or refreshed belongs to the embedding
// application, which plugs in through `CredentialProvider`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;

/// Source of the bearer token used for the channel and heartbeat requests.
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` when the user is not signed in.
    fn bearer_token(&self) -> Option<Arc<SecretString>>;

    /// Replace (or clear) the current token.
    fn set_token(&self, token: Option<SecretString>);
}

/// In-memory token holder. Reads are lock-free.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: ArcSwapOption<SecretString>,
}

impl StaticCredentials {
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            token: ArcSwapOption::new(token.map(Arc::new)),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<Arc<SecretString>> {
        self.token.load_full()
    }

    fn set_token(&self, token: Option<SecretString>) {
        self.token.store(token.map(Arc::new));
    }
}
