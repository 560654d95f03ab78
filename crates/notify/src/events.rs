//! Notification event types for watch transitions.

/// Events that trigger notifications.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    /// A watched product listing flipped back to in stock.
    ProductRestocked { name: String, url: String },

    /// A watched order's tracking status changed.
    OrderStatusChanged {
        tracking_number: String,
        status: String,
    },
}

impl NotifyEvent {
    /// Short title for log lines.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::ProductRestocked { name, .. } => format!("Restock: {name}"),
            Self::OrderStatusChanged {
                tracking_number, ..
            } => format!("Order {tracking_number} update"),
        }
    }

    /// Message body delivered to the operator.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ProductRestocked { name, url } => {
                format!("Product now in stock: {name}\n{url}")
            }
            Self::OrderStatusChanged {
                tracking_number,
                status,
            } => format!("Order {tracking_number} status changed:\n{status}"),
        }
    }
}
