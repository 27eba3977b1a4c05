use crate::presence::{PresenceEvent, format_duration};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Announcement {
    Started,
    Presence(PresenceEvent),
}

impl Announcement {
    pub fn message(&self) -> String {
        match self {
            Announcement::Started => "Wifi Monitor started. 🚀".to_string(),
            Announcement::Presence(PresenceEvent::Offline { ssid }) => {
                format!("📴 {ssid} is offline")
            }
            Announcement::Presence(PresenceEvent::Online { ssid, downtime }) => format!(
                "📡 {ssid} is back after {} of downtime",
                format_duration(*downtime)
            ),
        }
    }
}
