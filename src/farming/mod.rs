//! 刷图逻辑：捕捉策略、容量守卫、遭遇循环、检查点遍历、维护操作、后台回收

pub mod encounter;
pub mod events;
pub mod guard;
pub mod maintenance;
pub mod player;
pub mod policy;
pub mod recycler;
pub mod session;
pub mod stats;
pub mod traversal;
pub mod walking;

pub use events::{EventBus, FarmEvent};
pub use recycler::BackgroundRecycler;
pub use session::{FarmContext, Session};
