//! # 协议适配器能力模块
//!
//! 为各种现场协议提供统一的适配器契约：
//! - **Modbus TCP**：读取线圈、离散输入、保持/输入寄存器
//! - **MQTT**：订阅 topic 读点，并作为桥接目标发布消息
//! - **Memory**：无 I/O 的内存实现，用于接线与测试
//!
//! ## 架构设计
//!
//! ```text
//! ConnectionManager
//!       │  AdapterFactory::create(&Connection)
//!       ▼
//! Arc<dyn ProtocolAdapter>
//!       ├── ModbusTcpAdapter
//!       ├── MqttAdapter
//!       └── MemoryAdapter
//!       │
//!       ▼
//! AdapterEvent（状态变更 / 运行期错误）
//! ```
//!
//! 适配器只负责 I/O，调度（轮询、转发）由上层能力模块完成。

mod adapter;
mod error;
mod memory;
mod modbus_tcp;
mod mqtt;

pub use adapter::{AdapterEvent, AdapterFactory, DefaultAdapterFactory, ProtocolAdapter, StatusSignal};
pub use error::ProtocolError;
pub use memory::{MemoryAdapter, MemoryAdapterFactory, PublishedMessage};
pub use modbus_tcp::ModbusTcpAdapter;
pub use mqtt::MqttAdapter;
