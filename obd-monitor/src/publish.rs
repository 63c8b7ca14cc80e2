//! Broker publish path
//!
//! Renders telemetry snapshots into topic/payload pairs and hands them to a
//! host-supplied [`BrokerPublisher`]. The broker client itself lives outside
//! this crate. Only fields holding a valid reading are rendered.

use crate::store::VehicleTelemetry;
use crate::types::Gear;

/// Outbound message sink (e.g. an MQTT client owned by the host)
pub trait BrokerPublisher: Send + Sync {
    /// Publish one message; false if it could not be delivered
    fn publish(&self, topic: &str, payload: &str) -> bool;
}

/// One rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: String,
}

/// Render every known field of `snapshot` under `prefix`
pub fn render_messages(snapshot: &VehicleTelemetry, prefix: &str) -> Vec<BrokerMessage> {
    let prefix = prefix.trim_end_matches('/');
    let mut messages = Vec::new();
    let mut push = |name: &str, payload: String| {
        messages.push(BrokerMessage {
            topic: format!("{}/{}", prefix, name),
            payload,
        })
    };

    if let Some(soc) = snapshot.state_of_charge {
        push("soc", soc.to_string());
    }
    if let Some(voltage) = snapshot.aux_battery_voltage {
        push("voltage", format!("{:.2}", voltage));
    }
    if let Some(ambient) = snapshot.ambient_temperature {
        push("ambient", ambient.to_string());
    }
    if let Some(odometer) = snapshot.odometer {
        push("odometer", odometer.to_string());
    }
    if snapshot.gear != Gear::Unknown {
        push("gear", snapshot.gear.to_string());
    }
    if !snapshot.vin.is_empty() {
        push("vin", snapshot.vin.clone());
    }
    if let Some(rssi) = snapshot.signal_strength {
        push("rssi", rssi.to_string());
    }
    if let Some(soh) = snapshot.state_of_health {
        push("soh", format!("{:.2}", soh));
    }

    messages
}

/// Publish a snapshot; returns the number of messages accepted
pub fn publish_snapshot(
    publisher: &dyn BrokerPublisher,
    snapshot: &VehicleTelemetry,
    prefix: &str,
) -> usize {
    render_messages(snapshot, prefix)
        .iter()
        .filter(|m| {
            let ok = publisher.publish(&m.topic, &m.payload);
            if !ok {
                log::warn!("Failed to publish {}", m.topic);
            }
            ok
        })
        .count()
}
