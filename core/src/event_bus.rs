use tokio::sync::broadcast::{self, Sender};

/// Observer-facing events the controller publishes as it processes pedal
/// responses, MIDI input, and footswitch actions. UI/logging/BLE-notify
/// consumers subscribe independently via [`EventBus::sender`]; none of them
/// can back-pressure the controller loop.
#[derive(Debug, Clone)]
pub enum Event {
    UsbStatus(bool),
    BtStatus(bool),
    PresetChanged { index: u8, name: String },
    ParamChanged { index: usize, value: f32 },
    BypassChanged(bool),
    StateUpdated,
    FactoryResetRequested,
}

pub struct EventBus {
    pub sender: Sender<Event>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    /// Publishes an event, silently dropping it if there are no subscribers
    /// (a lagging or absent observer must never block the controller).
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(Event::UsbStatus(true));
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.sender.subscribe();
        bus.publish(Event::BypassChanged(true));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::BypassChanged(true)));
    }
}
