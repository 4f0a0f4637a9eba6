//! Synthetic input drivers.

use mimic_core::error::Result;
use mimic_core::events::MouseButton;

/// The seam between the replay engine and the OS. Production playback
/// goes through the enigo-backed driver in the platform module; tests and
/// dry runs use [`NoopDriver`].
pub trait InputDriver: Send {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()>;
    fn key(&mut self, key: &str, pressed: bool) -> Result<()>;
}

/// Discards everything. Keeps replay runnable, timing included, where no
/// injection backend exists or none is wanted.
#[derive(Debug, Default)]
pub struct NoopDriver;

impl InputDriver for NoopDriver {
    fn move_to(&mut self, _x: i32, _y: i32) -> Result<()> {
        Ok(())
    }

    fn button(&mut self, _button: MouseButton, _pressed: bool) -> Result<()> {
        Ok(())
    }

    fn key(&mut self, _key: &str, _pressed: bool) -> Result<()> {
        Ok(())
    }
}
