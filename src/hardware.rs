//! Hardware callback interfaces (spec §6 "Hardware callback interface").
//!
//! The core never polls hardware; drivers call back into handlers the core
//! registers at construction. `on_button` maps 1:1 onto coordinator
//! commands; `on_tag_detected` is consumed by [`crate::nfc`]; `on_tag_removed`
//! is accepted but ignored per spec.

use std::sync::Arc;

use crate::coordinator::{ControlAction, PlaybackCoordinator};

pub type TagDetectedHandler = Box<dyn Fn(String) + Send + Sync>;
pub type TagRemovedHandler = Box<dyn Fn() + Send + Sync>;
pub type ButtonHandler = Box<dyn Fn(ButtonEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    PlayPause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
}

/// NFC reader driver, consumed by [`crate::nfc::NfcAssociationService`].
pub trait NfcHardware: Send + Sync {
    fn on_tag_detected(&self, handler: TagDetectedHandler);
    /// Ignored by the core (spec §6); still exposed so a driver can register
    /// one without the core needing a no-op branch of its own.
    fn on_tag_removed(&self, handler: TagRemovedHandler);
    fn is_available(&self) -> bool;
}

/// Physical button/GPIO driver.
pub trait GpioHardware: Send + Sync {
    fn on_button(&self, handler: ButtonHandler);
}

/// Wires `on_button` events 1:1 onto coordinator commands (spec §6). Volume
/// step size is a fixed 5 points; there is no dedicated command for partial
/// volume nudges in the command surface, so this computes the new absolute
/// value itself.
pub fn wire_buttons(gpio: &dyn GpioHardware, coordinator: PlaybackCoordinator) {
    let coordinator = Arc::new(coordinator);
    gpio.on_button(Box::new(move |event| {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let result = match event {
                ButtonEvent::PlayPause => {
                    let status = coordinator.get_status().await;
                    let action = match status.state {
                        crate::model::PlaybackState::Playing { .. } => ControlAction::Pause,
                        _ => ControlAction::Resume,
                    };
                    coordinator.control(action, None).await.map(|_| ())
                }
                ButtonEvent::Next => coordinator.control(ControlAction::Next, None).await.map(|_| ()),
                ButtonEvent::Previous => coordinator.control(ControlAction::Previous, None).await.map(|_| ()),
                ButtonEvent::VolumeUp => {
                    let current = coordinator.get_status().await.volume;
                    coordinator.set_volume(current.saturating_add(5).min(100)).await
                }
                ButtonEvent::VolumeDown => {
                    let current = coordinator.get_status().await.volume;
                    coordinator.set_volume(current.saturating_sub(5)).await
                }
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, ?event, "button-mapped command failed");
            }
        });
    }));
}

pub mod mock {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MockNfcHardware {
        tag_detected: Mutex<Option<TagDetectedHandler>>,
        tag_removed: Mutex<Option<TagRemovedHandler>>,
    }

    impl MockNfcHardware {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn simulate_tag_detected(&self, uid: impl Into<String>) {
            if let Some(handler) = self.tag_detected.lock().unwrap().as_ref() {
                handler(uid.into());
            }
        }

        pub fn simulate_tag_removed(&self) {
            if let Some(handler) = self.tag_removed.lock().unwrap().as_ref() {
                handler();
            }
        }
    }

    impl NfcHardware for MockNfcHardware {
        fn on_tag_detected(&self, handler: TagDetectedHandler) {
            *self.tag_detected.lock().unwrap() = Some(handler);
        }

        fn on_tag_removed(&self, handler: TagRemovedHandler) {
            *self.tag_removed.lock().unwrap() = Some(handler);
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    pub struct MockGpioHardware {
        button: Mutex<Option<ButtonHandler>>,
    }

    impl MockGpioHardware {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn simulate_button(&self, event: ButtonEvent) {
            if let Some(handler) = self.button.lock().unwrap().as_ref() {
                handler(event);
            }
        }
    }

    impl GpioHardware for MockGpioHardware {
        fn on_button(&self, handler: ButtonHandler) {
            *self.button.lock().unwrap() = Some(handler);
        }
    }
}
