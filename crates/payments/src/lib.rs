//! Payment processor adapters.
//!
//! Every processor sits behind [`PaymentGateway`]; [`PaymentGateways`] picks
//! one by [`domain::PaymentProcessor`]. The adapters only talk to the
//! processor. Turning verified facts into an order is the commerce crate's job.

pub mod error;
pub mod gateway;
mod http;
pub mod memory;
pub mod paystack;
pub mod stripe;

pub use error::{GatewayError, Result};
pub use gateway::{CheckoutSession, PaymentFacts, PaymentGateway, PaymentGateways, PaymentRequest};
pub use http::DEFAULT_TIMEOUT;
pub use memory::InMemoryPaymentGateway;
pub use paystack::{PaystackConfig, PaystackGateway};
pub use stripe::{StripeConfig, StripeGateway};
