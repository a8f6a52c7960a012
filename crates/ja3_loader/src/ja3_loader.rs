use crate::config::ServiceConfig;
use crate::pipeline::Pipeline;
use crate::receiver::MessageReceiver;
use ja3_domain::{DiscardSubmitter, GraphSubmitter};
use ja3_gaffer::GafferClient;
use ja3_nats::{NatsClient, NatsConsumer};
use ja3_runner::AppProcess;
use std::sync::Arc;
use tracing::info;

/// Pick the graph store client, or the discarding one when no URL is configured.
pub fn build_submitter(config: &ServiceConfig) -> anyhow::Result<Arc<dyn GraphSubmitter>> {
    match config.gaffer_config() {
        Some(gaffer_config) => {
            info!(url = %gaffer_config.base_url, "Will use Gaffer at {}", gaffer_config.base_url);
            Ok(Arc::new(GafferClient::new(&gaffer_config)?))
        }
        None => {
            info!("No Gaffer URL configured, running in transform-only mode");
            Ok(Arc::new(DiscardSubmitter))
        }
    }
}

/// The consumer feeding the work queue plus the pipeline draining it.
pub struct Ja3Loader {
    pipeline: Pipeline,
    consumer: NatsConsumer,
}

impl Ja3Loader {
    pub async fn new(config: &ServiceConfig, nats_client: &NatsClient) -> anyhow::Result<Self> {
        info!("Initializing JA3 loader");

        let submitter = build_submitter(config)?;
        let (pipeline, queue) = Pipeline::new(config.pipeline_config(), submitter);

        let handler = Arc::new(MessageReceiver::new(queue));
        let consumer =
            NatsConsumer::new(nats_client.jetstream(), config.consumer_config(), handler).await?;

        info!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "JA3 loader initialized"
        );

        Ok(Self { pipeline, consumer })
    }

    /// Named processes for the runner: the broker consumer and the pipeline.
    pub fn into_runner_processes(self) -> Vec<(&'static str, AppProcess)> {
        let consumer = self.consumer;
        let consumer_process: AppProcess =
            Box::new(move |ctx| Box::pin(async move { consumer.run(ctx).await }));

        let pipeline = self.pipeline;
        let pipeline_process: AppProcess =
            Box::new(move |ctx| Box::pin(async move { pipeline.run(ctx).await }));

        vec![
            ("nats-consumer", consumer_process),
            ("pipeline", pipeline_process),
        ]
    }
}
