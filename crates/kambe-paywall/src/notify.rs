//! Admin notifications for recorded and declared payments

use crate::config::AdminContact;

/// Sink for messages addressed to the platform administrator
pub trait AdminNotifier: Send + Sync + std::fmt::Debug {
    fn notify(&self, subject: &str, message: &str);
}

/// `https://wa.me/<phone>?text=<message>` with the message form-encoded
#[must_use]
pub fn whatsapp_message_link(phone: &str, message: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let query = serde_urlencoded::to_string([("text", message)]).unwrap_or_default();
    if query.is_empty() {
        format!("https://wa.me/{digits}")
    } else {
        format!("https://wa.me/{digits}?{query}")
    }
}

/// Notifier that emits a tracing event carrying a ready-to-open WhatsApp link
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    contact: AdminContact,
}

impl LogNotifier {
    #[must_use]
    pub fn new(contact: AdminContact) -> Self {
        Self { contact }
    }
}

impl AdminNotifier for LogNotifier {
    fn notify(&self, subject: &str, message: &str) {
        let link = whatsapp_message_link(&self.contact.phone, &format!("{subject}\n{message}"));
        tracing::info!(
            target: "kambe_paywall::notify",
            subject,
            email = %self.contact.email,
            whatsapp = %link,
            "admin notified"
        );
    }
}
