use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

pub const COOKIE_NAME: &str = "disclaimerAccepted";
pub const COOKIE_DAYS: i64 = 30;

/// True when a `Cookie` header carries a truthy `disclaimerAccepted` value.
pub fn is_accepted(cookie_header: Option<&str>) -> bool {
    let Some(header) = cookie_header else {
        return false;
    };
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .any(|(name, value)| name.trim() == COOKIE_NAME && !value.trim().is_empty())
}

/// `Set-Cookie` value recording acceptance for [`COOKIE_DAYS`] days from `now`.
pub fn acceptance_cookie(now: DateTime<Utc>) -> String {
    let expires = now + Duration::days(COOKIE_DAYS);
    format!(
        "{}=true; Expires={}; Path=/",
        COOKIE_NAME,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

/// The one-time legal disclaimer dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclaimerGate {
    open: bool,
    dont_show_again: bool,
}

impl DisclaimerGate {
    /// Opens unless the request already carries the acceptance cookie.
    pub fn new(cookie_header: Option<&str>) -> Self {
        Self {
            open: !is_accepted(cookie_header),
            dont_show_again: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_dont_show_again(&mut self, value: bool) {
        self.dont_show_again = value;
    }

    /// Escape or a click outside the dialog. Ignored once "don't show again" is ticked.
    pub fn dismiss(&mut self) {
        if self.dont_show_again {
            debug!("[Disclaimer] Dismiss ignored; accept required");
            return;
        }
        self.open = false;
    }

    /// Closes the dialog. Returns the cookie to set when "don't show again" is ticked.
    pub fn accept(&mut self, now: DateTime<Utc>) -> Option<String> {
        self.open = false;
        if !self.dont_show_again {
            return None;
        }
        info!("[Disclaimer] Accepted for {} days", COOKIE_DAYS);
        Some(acceptance_cookie(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cookie_detection() {
        assert!(!is_accepted(None));
        assert!(!is_accepted(Some("theme=dark")));
        assert!(is_accepted(Some("theme=dark; disclaimerAccepted=true")));
        assert!(!is_accepted(Some("disclaimerAccepted=")));
    }

    #[test]
    fn test_accept_without_tick_sets_no_cookie() {
        let mut gate = DisclaimerGate::new(None);
        assert!(gate.is_open());
        assert_eq!(gate.accept(Utc::now()), None);
        assert!(!gate.is_open());
    }

    #[test]
    fn test_ticked_gate_requires_accept() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut gate = DisclaimerGate::new(Some(""));
        gate.set_dont_show_again(true);

        gate.dismiss();
        assert!(gate.is_open());

        let cookie = gate.accept(now).unwrap();
        assert_eq!(
            cookie,
            "disclaimerAccepted=true; Expires=Tue, 31 Mar 2026 12:00:00 GMT; Path=/"
        );
        assert!(!DisclaimerGate::new(Some("disclaimerAccepted=true")).is_open());
    }
}
