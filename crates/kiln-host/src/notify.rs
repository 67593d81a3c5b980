//! Operator notifications: the alarm buzzer and the optional webhook.
//!
//! No HTTP client ships in this build; wiring an actual POST to
//! `webhook_url` is host-integration work for whichever deployment
//! target picks this core up. What's here is the decision point where
//! that call would go, and the structured log line a real delivery
//! path would replace.

use kiln_core::types::AlarmPattern;
use kiln_core::KilnSettings;
use tracing::info;

/// Triggers the alarm GPIO with the given pattern. In this build that
/// GPIO is simulated, so triggering it just logs the pulse train that
/// would be sent.
pub fn sound_alarm(pattern: AlarmPattern) {
    let (pulses, on_ms, off_ms) = pattern.pulses();
    info!(?pattern, pulses, on_ms, off_ms, "alarm pattern triggered");
}

/// Notifies the configured webhook, if any and if enabled.
pub fn webhook_notify(settings: &KilnSettings, message: &str) {
    if !settings.notifications_enabled || settings.webhook_url.is_empty() {
        return;
    }
    info!(url = %settings.webhook_url, message, "would deliver webhook notification");
}
