//! Lambda entry point for the workflow's send-message task.

use std::sync::Arc;

use lambda_runtime::{Error, LambdaEvent, service_fn};
use telegram_webhook::config::RelayConfig;
use telegram_webhook::fetch::BasicClient;
use telegram_webhook::infra::keys::SsmKeyStore;
use telegram_webhook::infra::registry::{AwsConfigLoader, ClientKind, ClientRegistry};
use telegram_webhook::relay::{MessageRelay, SendMessageInput, SendMessageOutput};
use telegram_webhook::telemetry;
use tracing::Instrument;

struct App {
    registry: Arc<ClientRegistry<AwsConfigLoader>>,
    keys: SsmKeyStore,
    config: RelayConfig,
}

impl App {
    /// HTTP client shared by every invocation of this container.
    async fn http(&self) -> Result<Arc<BasicClient>, Error> {
        let http_timeout = self.config.http_timeout;
        let connect_timeout = self.config.connect_timeout;
        let http = self
            .registry
            .try_get_or_init(ClientKind::MessagingHttp, |_| {
                Ok(BasicClient::with_timeouts(http_timeout, connect_timeout)?)
            })
            .await?;
        Ok(http)
    }
}

async fn handle_request(
    app: &App,
    event: LambdaEvent<SendMessageInput>,
) -> Result<SendMessageOutput, Error> {
    let span = tracing::info_span!("send_message", request_id = %event.context.request_id);

    async {
        let http = app.http().await?;
        let relay = MessageRelay::new(http, &app.keys, app.config.clone());
        Ok::<_, Error>(relay.send(&event.payload).await?)
    }
    .instrument(span)
    .await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_lambda();

    let registry = Arc::new(ClientRegistry::new(AwsConfigLoader));
    let app = App {
        keys: SsmKeyStore::new(registry.clone()),
        registry,
        config: RelayConfig::from_env(),
    };

    let app = &app;
    lambda_runtime::run(service_fn(move |event| handle_request(app, event))).await
}
