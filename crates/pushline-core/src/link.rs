// ── Transport seam ──
//
// The controller talks to the network only through `ChannelLink`, so the
// lifecycle logic can be driven by an in-memory link in tests. The real
// implementation is `pushline_api::PushClient`.

use futures_util::future::BoxFuture;
use secrecy::SecretString;

use pushline_api::{ByteStream, PushClient};

/// Opens the push channel and acknowledges heartbeats.
pub trait ChannelLink: Send + Sync {
    /// Issue the streaming open request. Resolves when the server accepted
    /// the channel; the stream then yields body chunks.
    fn open<'a>(
        &'a self,
        identity: &'a str,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<ByteStream, pushline_api::Error>>;

    /// Acknowledge one liveness probe.
    fn acknowledge<'a>(
        &'a self,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<(), pushline_api::Error>>;
}

impl ChannelLink for PushClient {
    fn open<'a>(
        &'a self,
        identity: &'a str,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<ByteStream, pushline_api::Error>> {
        Box::pin(self.open_channel(identity, token))
    }

    fn acknowledge<'a>(
        &'a self,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<(), pushline_api::Error>> {
        Box::pin(PushClient::acknowledge(self, token))
    }
}
