//! Volume control
//!
//! Linear 0.0-1.0 level, applied to the sink as-is. Mute keeps the stored
//! level so unmuting restores it.

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Volume level (0.0-1.0)
    level: f32,

    /// Mute state (preserves volume level)
    muted: bool,
}

impl Volume {
    /// Create new volume controller
    ///
    /// # Arguments
    /// * `level` - Initial volume, clamped to 0.0-1.0 (NaN becomes 0.0)
    pub fn new(level: f32) -> Self {
        let mut volume = Self {
            level: 0.0,
            muted: false,
        };
        volume.set_level(level);
        volume
    }

    /// Set volume level, clamped to 0.0-1.0
    ///
    /// NaN is not a level and leaves the current one untouched.
    /// Returns the stored level.
    pub fn set_level(&mut self, level: f32) -> f32 {
        if !level.is_nan() {
            self.level = level.clamp(0.0, 1.0);
        }
        self.level
    }

    /// Get current volume level (0.0-1.0)
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Mute audio (preserves volume level)
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute audio (restores previous volume)
    pub fn unmute(&mut self) {
        self.muted = false;
    }

    /// Toggle mute state
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Level the sink should receive: 0.0 while muted
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_levels() {
        let mut volume = Volume::default();
        assert_eq!(volume.set_level(1.5), 1.0);
        assert_eq!(volume.set_level(-0.2), 0.0);
        assert_eq!(volume.set_level(f32::INFINITY), 1.0);
        assert_eq!(volume.set_level(f32::NEG_INFINITY), 0.0);
        assert_eq!(volume.set_level(0.25), 0.25);
    }

    #[test]
    fn nan_keeps_previous_level() {
        let mut volume = Volume::new(0.4);
        assert_eq!(volume.set_level(f32::NAN), 0.4);
        assert_eq!(Volume::new(f32::NAN).level(), 0.0);
    }

    #[test]
    fn mute_preserves_level() {
        let mut volume = Volume::new(0.6);
        volume.mute();
        assert!(volume.is_muted());
        assert_eq!(volume.level(), 0.6);
        assert_eq!(volume.effective(), 0.0);

        volume.toggle_mute();
        assert!(!volume.is_muted());
        assert_eq!(volume.effective(), 0.6);
    }

    #[test]
    fn changing_level_while_muted_stays_muted() {
        let mut volume = Volume::new(0.6);
        volume.mute();
        volume.set_level(0.9);
        assert_eq!(volume.effective(), 0.0);
        volume.unmute();
        assert_eq!(volume.effective(), 0.9);
    }
}
