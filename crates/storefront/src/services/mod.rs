//! External collaborators and domain services: the payment provider client,
//! the fulfillment engine, and the delivery mailer.

pub mod fulfillment;
pub mod notify;
pub mod payments;

pub use fulfillment::{FulfillmentEngine, IpnOutcome};
pub use notify::{NotifyError, OrderMailer};
pub use payments::{PaymentsClient, PaymentsError};
