use lookout_capture::HotkeyManager;
use lookout_core::safety::InterruptSource;

/// The configured global hotkey as an interrupt source
pub struct HotkeyInterrupt(HotkeyManager);

impl HotkeyInterrupt {
    /// Register the hotkey; an empty spec means Escape
    pub fn register(spec: &str) -> anyhow::Result<Self> {
        let manager = if spec.trim().is_empty() {
            HotkeyManager::escape()?
        } else {
            HotkeyManager::parse(spec)?
        };
        tracing::debug!(id = manager.id(), hotkey = %spec, "abort hotkey registered");
        Ok(Self(manager))
    }
}

impl InterruptSource for HotkeyInterrupt {
    fn poll(&mut self) -> bool {
        self.0.poll()
    }
}
