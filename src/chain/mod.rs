pub mod core_rpc;
pub mod explorer;
pub mod gateway;
pub mod model;

pub use gateway::{ChainGateway, RpcServerType};
