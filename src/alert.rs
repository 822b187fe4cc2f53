use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sns::error::DisplayErrorContext;

use crate::config::PipelineConfig;
use crate::console::Console;

pub const ALERT_SUBJECT: &str = "deployer pipeline error";

/// Best-effort failure notification. Implementations must not fail or panic:
/// an alert that cannot be delivered is logged and forgotten.
pub trait AlertSink {
    fn notify(&self, message: &str);
}

/// Fallible transport behind a [`Notifier`].
pub trait Publisher {
    fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

/// Used when no alert destination is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledSink;

impl AlertSink for DisabledSink {
    fn notify(&self, message: &str) {
        tracing::debug!(%message, "alerting disabled; dropping notification");
    }
}

/// Turns any [`Publisher`] into an [`AlertSink`] by swallowing its errors.
pub struct Notifier<P> {
    publisher: P,
    console: Console,
}

impl<P: Publisher> Notifier<P> {
    pub fn new(publisher: P, console: Console) -> Self {
        Self { publisher, console }
    }
}

impl<P: Publisher> AlertSink for Notifier<P> {
    fn notify(&self, message: &str) {
        match self.publisher.publish(ALERT_SUBJECT, message) {
            Ok(()) => {
                tracing::info!("failure alert delivered");
                self.console.success("Alert sent.");
            }
            Err(err) => {
                let detail = format!("{err:#}");
                tracing::error!(error = %detail, "failed to deliver failure alert");
                self.console.error(&format!("Alert delivery failed: {detail}"));
            }
        }
    }
}

/// Publishes alerts to an AWS SNS topic.
#[derive(Clone, Debug)]
pub struct SnsPublisher {
    topic_arn: String,
    region: String,
}

impl SnsPublisher {
    pub fn new(topic_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            region: region.into(),
        }
    }
}

impl Publisher for SnsPublisher {
    fn publish(&self, subject: &str, message: &str) -> Result<()> {
        // The rest of the tool is synchronous; the SDK only needs a runtime for this call.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting runtime for SNS client")?;

        runtime.block_on(async {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(self.region.clone()))
                .load()
                .await;
            let client = aws_sdk_sns::Client::new(&sdk_config);
            client
                .publish()
                .topic_arn(&self.topic_arn)
                .subject(subject)
                .message(message)
                .send()
                .await
                .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(err)))
                .with_context(|| format!("publishing to {}", self.topic_arn))?;
            Ok::<_, anyhow::Error>(())
        })
    }
}

/// Pick the sink matching the configuration's alert section.
pub fn from_config(config: &PipelineConfig, console: Console) -> Box<dyn AlertSink> {
    match config.alert_destination() {
        Some(destination) => {
            tracing::debug!(
                topic = destination.topic_arn,
                region = destination.region,
                "SNS alerting enabled"
            );
            Box::new(Notifier::new(
                SnsPublisher::new(destination.topic_arn, destination.region),
                console,
            ))
        }
        None => Box::new(DisabledSink),
    }
}
