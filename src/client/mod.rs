//! 远端协作方抽象：会话客户端、背包服务、登录连接器，以及共享句柄与模拟世界

pub mod handle;
pub mod mock;
pub mod traits;
pub mod types;

pub use handle::ClientHandle;
pub use mock::{SimulatedConnector, SimulatedWorld};
pub use traits::{
    AuthMethod, ClientError, Connection, Connector, Credentials, InventoryService,
    RecyclePolicy, SessionClient,
};
