pub mod event;
pub mod ticket;

pub use event::EventSnapshot;
pub use ticket::{GatewayStatus, Ticket, TicketStatus, TicketView, TransactionStatusView};
