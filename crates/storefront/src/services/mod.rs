//! Order pipeline services.
//!
//! # Services
//!
//! - `verification` - One-time contact codes and payment signatures
//! - `pricing` - Charge rules applied to a cart subtotal
//! - `inventory` - Availability derived from in-flight orders
//! - `notifications` - Best-effort buyer messages (Klaviyo)
//! - `checkout` - The order orchestrator tying the above to the carrier

pub mod checkout;
pub mod inventory;
pub mod notifications;
pub mod pricing;
pub mod verification;

pub use checkout::{OrderOrchestrator, OrderReceipt, OrderSubmission, SUPPORT_MESSAGE, SubmitError};
pub use inventory::{Availability, InventoryError, InventoryOracle, StockSnapshot};
pub use notifications::{
    KlaviyoNotifier, LogNotifier, NotificationDispatcher, NotificationTemplate, Notifier,
    NotifyError, Recipient,
};
pub use pricing::{PriceQuote, PricingEngine, PricingError};
pub use verification::{PaymentProof, VerificationError, VerificationGate, VerificationSettings};
