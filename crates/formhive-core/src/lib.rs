pub mod config;
pub mod engine;
pub mod flow;
pub mod messages;
pub mod photo;
pub mod session;
pub mod sink;
pub mod transport;

pub use config::*;
pub use engine::*;
pub use flow::*;
pub use messages::*;
pub use photo::*;
pub use session::*;
pub use sink::*;
pub use transport::*;
