//! Change-freeze gate: a temporal window during which governance mutations
//! are disallowed.
//!
//! Purely temporal state (`active` + `until`); the fields are set by the
//! `freeze` subsystem CLI and only ever read here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct FreezeWindow {
    pub active: bool,
    pub until: Option<DateTime<Utc>>,
}

impl FreezeWindow {
    pub fn inactive() -> Self {
        Self {
            active: false,
            until: None,
        }
    }

    pub fn active_until(until: DateTime<Utc>) -> Self {
        Self {
            active: true,
            until: Some(until),
        }
    }

    /// Frozen strictly before `until`; an expired window thaws on its own
    /// without being deactivated.
    pub fn is_frozen(&self, now: DateTime<Utc>) -> bool {
        self.active && self.until.is_some_and(|until| now < until)
    }

    pub fn until_display(&self) -> String {
        self.until
            .map(|u| u.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn frozen_strictly_inside_window() {
        let until = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let window = FreezeWindow::active_until(until);

        let before = Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 59).unwrap();
        assert!(window.is_frozen(before));
        // `until` itself is outside the window.
        assert!(!window.is_frozen(until));
        let after = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 1).unwrap();
        assert!(!window.is_frozen(after));
    }

    #[test]
    fn inactive_window_never_freezes() {
        let window = FreezeWindow::inactive();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(!window.is_frozen(now));
    }

    #[test]
    fn active_without_until_never_freezes() {
        let window = FreezeWindow {
            active: true,
            until: None,
        };
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(!window.is_frozen(now));
    }
}
