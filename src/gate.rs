/// Holds back playback until the listener has interacted with the console.
///
/// While locked, the gate keeps at most one deferred request; a newer request
/// replaces the older one. Opening drains that slot exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockGate<T> {
    Locked { pending: Option<T> },
    Unlocked,
}

impl<T> Default for UnlockGate<T> {
    fn default() -> Self {
        Self::Locked { pending: None }
    }
}

impl<T> UnlockGate<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Unlocked)
    }

    pub fn pending(&self) -> Option<&T> {
        match self {
            Self::Locked { pending } => pending.as_ref(),
            Self::Unlocked => None,
        }
    }

    /// Stores `request` as the deferred request and returns the one it replaced.
    /// Has no effect on an open gate; the request is handed back instead.
    pub fn defer(&mut self, request: T) -> Result<Option<T>, T> {
        match self {
            Self::Locked { pending } => Ok(pending.replace(request)),
            Self::Unlocked => Err(request),
        }
    }

    /// Opens the gate. Returns `None` if it was already open, otherwise the
    /// deferred request (if any).
    pub fn open(&mut self) -> Option<Option<T>> {
        match std::mem::replace(self, Self::Unlocked) {
            Self::Locked { pending } => Some(pending),
            Self::Unlocked => None,
        }
    }

    /// Closes the gate again with `request` waiting, e.g. when the output
    /// refused to start after all.
    pub fn relock(&mut self, request: T) {
        *self = Self::Locked {
            pending: Some(request),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::UnlockGate;

    #[test]
    fn newest_deferred_request_wins() {
        let mut gate = UnlockGate::new();
        assert_eq!(gate.defer("x"), Ok(None));
        assert_eq!(gate.defer("y"), Ok(Some("x")));
        assert_eq!(gate.open(), Some(Some("y")));
        assert!(gate.is_open());
    }

    #[test]
    fn opening_twice_drains_once() {
        let mut gate: UnlockGate<u32> = UnlockGate::new();
        assert_eq!(gate.defer(7), Ok(None));
        assert_eq!(gate.open(), Some(Some(7)));
        assert_eq!(gate.open(), None);
        assert_eq!(gate.defer(8), Err(8));
    }

    #[test]
    fn relock_restores_pending() {
        let mut gate: UnlockGate<u32> = UnlockGate::new();
        let _ = gate.open();
        gate.relock(3);
        assert!(!gate.is_open());
        assert_eq!(gate.pending(), Some(&3));
    }
}
