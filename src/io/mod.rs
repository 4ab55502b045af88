//! I/O module
//!
//! Everything that touches the outside world.
//!
//! # Components
//!
//! - `gateway` - HTTP client implementing the API traits
//! - `envelope` - Response-shape normalization for the gateway
//! - `session_file` - Session persistence backends
//! - `csv_format` - CSV output for the CLI reports

pub mod csv_format;
pub mod envelope;
pub mod gateway;
pub mod session_file;

pub use csv_format::{
    write_activity_csv, write_brand_balances_csv, write_cards_csv, write_loads_csv,
    write_operations_csv, write_outcome_csv, write_session_csv, write_summary_csv,
    write_user_details_csv, write_users_csv,
};
pub use gateway::HttpGateway;
pub use session_file::{FileStorage, MemoryStorage};
