//! Ticket naming, QR issuance and gate check-in.

pub mod issuance;
pub mod qr;
pub mod scanner;

pub use issuance::{IssueRequest, IssuedQr, QrIssuer};
pub use scanner::{CheckinService, ScanOutcome, ScanRequest};
