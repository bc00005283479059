use std::str::FromStr;

use anyhow::{Context, Result};
use global_hotkey::{
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
    hotkey::{Code, HotKey},
};

/// A single registered global hotkey, unregistered on drop.
///
/// The OS registration is tied to the creating thread, so create and poll it
/// on the same thread.
pub struct HotkeyManager {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
}

impl HotkeyManager {
    /// Register Escape, the default abort key
    pub fn escape() -> Result<Self> {
        Self::register(HotKey::new(None, Code::Escape))
    }

    /// Register a hotkey from text such as "Escape" or "control+shift+KeyQ"
    pub fn parse(spec: &str) -> Result<Self> {
        let hotkey = HotKey::from_str(spec)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid hotkey '{spec}'"))?;
        Self::register(hotkey)
    }

    fn register(hotkey: HotKey) -> Result<Self> {
        let manager = GlobalHotKeyManager::new().context("Failed to create hotkey manager")?;

        manager
            .register(hotkey)
            .context("Failed to register hotkey")?;

        Ok(Self { manager, hotkey })
    }

    /// Check if hotkey was pressed (non-blocking)
    pub fn poll(&self) -> bool {
        let receiver = GlobalHotKeyEvent::receiver();
        let mut pressed = false;

        // Drain so a burst of key repeats does not queue up stale presses
        while let Ok(event) = receiver.try_recv() {
            if event.id == self.hotkey.id() && event.state == HotKeyState::Pressed {
                pressed = true;
            } else if event.id != self.hotkey.id() {
                tracing::trace!(id = event.id, "ignoring unrelated hotkey event");
            }
        }

        pressed
    }

    /// Get the hotkey ID for matching events
    pub fn id(&self) -> u32 {
        self.hotkey.id()
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        let _ = self.manager.unregister(self.hotkey);
    }
}
