//! Lambda entry point for the HTTP API request authorizer.

use std::sync::Arc;
use std::time::SystemTime;

use lambda_runtime::{Error, LambdaEvent, service_fn};
use telegram_webhook::authorizer::{
    Authorizer, AuthorizerRequest, AuthorizerResponse, remaining_budget,
};
use telegram_webhook::config::AuthorizerConfig;
use telegram_webhook::infra::keys::SsmKeyStore;
use telegram_webhook::infra::registry::{AwsConfigLoader, ClientRegistry};
use telegram_webhook::telemetry;
use tracing::Instrument;

async fn handle_request(
    authorizer: &Authorizer<SsmKeyStore>,
    event: LambdaEvent<AuthorizerRequest>,
) -> Result<AuthorizerResponse, Error> {
    let budget = remaining_budget(event.context.deadline, SystemTime::now());
    let span = tracing::info_span!("authorize", request_id = %event.context.request_id);

    let decision = authorizer
        .authorize(&event.payload, Some(budget))
        .instrument(span)
        .await;

    Ok(decision.into())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_lambda();

    let registry = Arc::new(ClientRegistry::new(AwsConfigLoader));
    let config = AuthorizerConfig::from_env();
    if config.secret_param.is_none() {
        tracing::error!("TELEGRAM_SECRET_PARAM is not set; every request will be denied");
    }
    let authorizer = Authorizer::new(SsmKeyStore::new(registry), config);

    let authorizer = &authorizer;
    lambda_runtime::run(service_fn(move |event| handle_request(authorizer, event))).await
}
