use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, error};
use rumqttc::{MqttOptions, QoS};
use serde_derive::Serialize;

use crate::config;
use crate::messages::Announcement;
use crate::notify::{Notifier, NotifyError};
use crate::presence::PresenceEvent;

/// Publishes presence transitions as retained JSON, one topic per SSID, so
/// home automation can follow targets without polling ntfy.
#[derive(Debug, Clone)]
pub struct MqttNotifier {
    client: rumqttc::AsyncClient,
    publisher_id: String,
    topic_path: String,
}

#[derive(Debug, Serialize)]
struct PresenceMqttMessage<'a> {
    name: &'a str,
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    downtime_seconds: Option<i64>,
}

impl MqttNotifier {
    pub fn new(config: &config::MqttConfig) -> (Self, rumqttc::EventLoop) {
        let publisher_id = config
            .publisher_id
            .clone()
            .unwrap_or_else(|| "wifi-monitor".to_string());

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        (
            MqttNotifier {
                client,
                publisher_id,
                topic_path: config
                    .topic_path
                    .clone()
                    .unwrap_or_else(|| "monitor".to_string()),
            },
            eventloop,
        )
    }

    /// Drives the connection; outgoing publishes only leave once this is polled.
    pub async fn event_loop(eventloop: &mut rumqttc::EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    debug!("Connection acknowledged");
                }
                Ok(rumqttc::Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                    debug!("MQTT client disconnected");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn topic(&self, leaf: &str) -> String {
        format!("{}/{}/{}", self.topic_path, self.publisher_id, leaf)
    }

    async fn publish(&self, topic: String, payload: String) -> Result<(), NotifyError> {
        debug!("Publishing to {}: {}", topic, payload);
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload)
            .await?;
        Ok(())
    }
}

fn presence_payload(event: &PresenceEvent) -> Result<String, serde_json::Error> {
    let message = match event {
        PresenceEvent::Offline { ssid } => PresenceMqttMessage {
            name: ssid,
            state: "offline",
            downtime_seconds: None,
        },
        PresenceEvent::Online { ssid, downtime } => PresenceMqttMessage {
            name: ssid,
            state: "online",
            downtime_seconds: Some(downtime.num_seconds()),
        },
    };
    serde_json::to_string(&message)
}

impl Notifier for MqttNotifier {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn announce<'a>(
        &'a self,
        announcement: &'a Announcement,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            match announcement {
                Announcement::Started => {
                    self.publish(self.topic("status"), "online".to_string())
                        .await
                }
                Announcement::Presence(event) => {
                    let payload = presence_payload(event)?;
                    self.publish(self.topic(&sanitize_name(event.ssid())), payload)
                        .await
                }
            }
        })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            debug!("Disconnecting MQTT client");
            if let Err(err) = self.client.disconnect().await {
                error!("Error disconnecting MQTT client: {:?}", err);
            }
        })
    }
}

fn sanitize_name(name: &str) -> String {
    // Remove any non-alphanumeric characters and replace spaces with underscores
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}
