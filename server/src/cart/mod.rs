//! Cart validation, pricing and order confirmation.

pub mod confirm;
pub mod cpf;
pub mod pricing;
pub mod types;
pub mod validator;

pub use confirm::{ConfirmedOrder, OrderConfirmer};
pub use cpf::Cpf;
pub use types::{CartItem, CartQuote, CartRequest, CartSummary, Pricing};
pub use validator::CartValidator;
