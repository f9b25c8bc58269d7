// Communication channels for game automation
use super::types::AutomationEvent;
use tokio::sync::mpsc;

pub const EVENT_CAPACITY: usize = 256;

/// Event channel for a front end. The driver never waits on it; events are
/// dropped when the receiver falls behind.
pub fn create_automation_channels() -> (mpsc::Sender<AutomationEvent>, mpsc::Receiver<AutomationEvent>) {
    mpsc::channel(EVENT_CAPACITY)
}
