/// How many reconnects a failure path may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Retry on every failure, forever. Used by the heartbeat.
    Unlimited,
    /// A single attempt, then give up. Used by service calls.
    Once,
}

impl ReconnectPolicy {
    /// Whether another attempt is allowed after `attempts` failed ones.
    pub fn allows(self, attempts: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Once => attempts == 0,
        }
    }
}
