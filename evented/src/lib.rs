//! 进程内发布/订阅核心（evented）
//!
//! 为任意有状态对象附加事件能力：
//! - 监听表（`table`）：每个发射器独占的“事件名 → 有序监听记录”；
//! - 匹配谓词（`matcher`）：按可选的事件名/回调/上下文挑选待注销记录；
//! - 分发器（`dispatcher`）：对快照同步调用处理器，处理通配通道与一次性监听；
//! - 发射器能力（`emitter`）：`on`/`once`/`off`/`trigger` 以及跨对象的
//!   `listen_to`/`listen_to_once`/`stop_listening`；
//! - 监听关系登记簿（`listening`）：监听方记录自己正在监听谁，用于批量或定向拆除。
//!
//! 全部操作同步完成，不排队、不延迟；处理器可以重入调用任何 API。
//!
//! 典型用法：
//! ```rust
//! use evented::{Callback, Emitter, Evented};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let counter = Evented::new(AtomicUsize::new(0));
//! let inc = Callback::new(|inv| {
//!     inv.receiver::<AtomicUsize>()?.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! counter.on(("change", &inc), Some(&counter.receiver()));
//! counter.trigger("change", &[]).unwrap();
//! counter.trigger("change", &[]).unwrap();
//! assert_eq!(counter.load(Ordering::SeqCst), 2);
//! ```
//!
pub mod bindings;
pub mod callback;
pub mod config;
mod dispatcher;
pub mod emitter;
pub mod error;
pub mod listening;
pub mod matcher;
pub mod table;

pub use bindings::{Bindings, EventMap};
pub use callback::{Callback, Context, Invocation};
pub use config::{DEFAULT_WILDCARD, EventsConfig};
pub use emitter::{Emitter, Evented, Events, WeakEvents};
pub use error::{EventError, EventResult};
pub use listening::{Relation, RelationId};
