// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod aws;

use std::{env, sync::Arc};

use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{service_fn, LambdaEvent};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use dmarc_metrics::{
    config::Config,
    flusher::{Flusher, FlusherConfig},
    processor::{BatchOutcome, Processor},
    token::TokenFactory,
};

#[tokio::main]
pub async fn main() -> Result<(), lambda_runtime::Error> {
    let log_level = env::var("DMARC_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,aws_smithy_runtime=warn,{log_level}");

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter)?)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on DMARC metrics startup: {e}");
            return Err(e.into());
        }
    };
    info!(
        "Pushing DMARC metrics to {} with {} compression",
        config.push_url,
        config.compression.content_encoding()
    );

    let aws_config = aws_config::load_from_env().await;
    let reader = Arc::new(aws::S3ObjectReader::new(aws_sdk_s3::Client::new(
        &aws_config,
    )));
    let token_factory = Arc::new(TokenFactory::new_from_resolver(aws::ssm_token_resolver(
        aws_sdk_ssm::Client::new(&aws_config),
        config.token_parameter.clone(),
    )));

    let flusher = Flusher::new(FlusherConfig {
        token_factory,
        push_url: config.push_url.clone(),
        user_id: config.user_id.clone(),
        timeout: config.push_timeout,
        compression: config.compression,
    })?;
    let processor = Arc::new(Processor::new(reader, flusher));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<S3Event>| {
        let processor = Arc::clone(&processor);
        async move { handle(&processor, event.payload).await }
    }))
    .await
}

async fn handle(processor: &Processor, event: S3Event) -> Result<BatchOutcome, lambda_runtime::Error> {
    let objects = aws::object_refs(&event);
    debug!("Received notification for {} objects", objects.len());
    Ok(processor.process_batch(&objects).await?)
}
