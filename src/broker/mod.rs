pub mod relay;

pub use relay::{Broker, BrokerAddrs};
