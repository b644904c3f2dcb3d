pub mod coupon;
pub mod event;
pub mod lot;
pub mod order;
pub mod ticket;

pub use coupon::{Coupon, CouponKind, CouponLimits, NewCouponUsage};
pub use event::{Event, EventStatus, LimitRules};
pub use lot::{Lot, TicketType};
pub use order::{Order, OrderStatus};
pub use ticket::{CheckinResult, NewCheckin, QrRotation, Ticket, TicketStatus};
