//! gateway-core
//!
//! Pure gateway-client domain logic:
//! - value objects (contracts, bars, ticks, depth updates, notices)
//! - book side / depth operation enums
//! - position-addressed market depth book

pub mod side;
pub mod messages;
pub mod depth_book;
pub mod top_of_book;
pub mod error;

pub use side::Side;

pub use messages::{
    Bar,
    Contract,
    ContractDetails,
    DepthOperation,
    DepthUpdate,
    ErrorNotice,
    HistoricalDataRequest,
    TickAttributes,
    TickEvent,
};

pub use depth_book::{DepthLevel, MarketDepth, MarketDepthBook};
pub use top_of_book::TopOfBook;
pub use error::DepthError;
