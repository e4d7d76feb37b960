use std::time::Duration;

/// Construction-time settings for a [`Supervisor`](super::supervisor::Supervisor).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Queue depth of the command channel behind a `SupervisorClient`.
    pub command_capacity: usize,
    /// Queue depth of the channel handles report status and log events on.
    pub event_capacity: usize,
    /// How many `Notice`s a slow notice receiver may lag behind.
    pub notice_capacity: usize,
    /// Handed to the built-in TCP connector factory.
    pub connect_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command_capacity: 32,
            event_capacity: 64,
            notice_capacity: 64,
            connect_timeout: Duration::from_secs(10),
        }
    }
}
