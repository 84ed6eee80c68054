#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing drawn since the session opened or since the last saved snapshot.
    Idle,
    Editing,
    /// A flattened snapshot has been handed off and the save is in flight.
    Flattening,
}

impl SessionPhase {
    pub fn is_saving(self) -> bool {
        matches!(self, Self::Flattening)
    }
}

pub fn can_transition(from: SessionPhase, to: SessionPhase) -> bool {
    matches!(
        (from, to),
        (SessionPhase::Idle, SessionPhase::Editing)
            | (SessionPhase::Idle, SessionPhase::Flattening)
            | (SessionPhase::Editing, SessionPhase::Flattening)
            | (SessionPhase::Flattening, SessionPhase::Idle)
            | (SessionPhase::Flattening, SessionPhase::Editing)
    ) || from == to
}
