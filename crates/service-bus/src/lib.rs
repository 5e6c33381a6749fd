//! Service bus abstraction for async message passing between components.

use tokio::sync::mpsc;

pub struct ServiceBus<T> {
    pub sender: mpsc::Sender<T>,
    pub receiver: mpsc::Receiver<T>,
}

impl<T> ServiceBus<T> {
    pub fn new(buffer: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        Self { sender, receiver }
    }
}
