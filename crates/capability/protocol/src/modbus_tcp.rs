//! Modbus TCP 适配器
//!
//! 连接 Modbus 从设备，按点位地址读取线圈、离散输入、保持寄存器与输入寄存器。
//!
//! ## 点位地址示例
//!
//! ```json
//! { "protocol": "modbus_tcp", "register": "holding_register", "address": 100, "unitId": 1 }
//! ```

use crate::adapter::{AdapterEvent, ProtocolAdapter, StatusSignal};
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{
    now_epoch_ms, ConnectionStatus, DataType, ModbusAddress, ModbusTcpConfig, Protocol,
    ReadResult, RegisterKind, Tag, TagAddress, TagValue, WordOrder,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// 单点读取失败的原因。
enum ReadError {
    /// 设备返回异常码或数据无法解析，仅影响该点位
    Point(ProtocolError),
    /// 传输层失败，连接已不可用
    Transport(ProtocolError),
}

/// Modbus TCP 适配器
pub struct ModbusTcpAdapter {
    config: ModbusTcpConfig,
    ctx: Mutex<Option<Context>>,
    signal: StatusSignal,
}

impl ModbusTcpAdapter {
    pub fn new(config: ModbusTcpConfig) -> Self {
        Self {
            config,
            ctx: Mutex::new(None),
            signal: StatusSignal::new(),
        }
    }

    async fn resolve_addr(&self) -> Result<SocketAddr, ProtocolError> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let mut addrs = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| ProtocolError::ConfigParse(format!("invalid address {}: {}", target, e)))?;
        addrs
            .next()
            .ok_or_else(|| ProtocolError::ConfigParse(format!("unresolved address: {}", target)))
    }

    /// 读取单个点位
    async fn read_point(
        &self,
        ctx: &mut Context,
        address: &ModbusAddress,
        data_type: DataType,
    ) -> Result<TagValue, ReadError> {
        ctx.set_slave(Slave(address.unit_id.unwrap_or(self.config.unit_id)));
        let request_timeout = Duration::from_millis(self.config.request_timeout_ms);

        match address.register {
            RegisterKind::Coil | RegisterKind::DiscreteInput => {
                let request = async {
                    if address.register == RegisterKind::Coil {
                        ctx.read_coils(address.address, 1).await
                    } else {
                        ctx.read_discrete_inputs(address.address, 1).await
                    }
                };
                let bits = timeout(request_timeout, request)
                    .await
                    .map_err(|_| {
                        ReadError::Transport(ProtocolError::Timeout(format!(
                            "read bit {} timed out",
                            address.address
                        )))
                    })?
                    .map_err(|e| ReadError::Transport(ProtocolError::Modbus(e.to_string())))?
                    .map_err(|e| {
                        ReadError::Point(ProtocolError::Modbus(format!("exception: {:?}", e)))
                    })?;
                let bit = bits.first().copied().ok_or_else(|| {
                    ReadError::Point(ProtocolError::DataParse("empty coil response".to_string()))
                })?;
                Ok(TagValue::Bool(bit))
            }
            RegisterKind::HoldingRegister | RegisterKind::InputRegister => {
                let count = register_count(address, data_type);
                let request = async {
                    if address.register == RegisterKind::HoldingRegister {
                        ctx.read_holding_registers(address.address, count).await
                    } else {
                        ctx.read_input_registers(address.address, count).await
                    }
                };
                let registers = timeout(request_timeout, request)
                    .await
                    .map_err(|_| {
                        ReadError::Transport(ProtocolError::Timeout(format!(
                            "read register {} timed out",
                            address.address
                        )))
                    })?
                    .map_err(|e| ReadError::Transport(ProtocolError::Modbus(e.to_string())))?
                    .map_err(|e| {
                        ReadError::Point(ProtocolError::Modbus(format!("exception: {:?}", e)))
                    })?;

                debug!(
                    target: "gw.protocol",
                    register = address.address,
                    count = count,
                    values = ?registers,
                    "read modbus registers"
                );

                decode_registers(&registers, data_type, address).map_err(ReadError::Point)
            }
        }
    }
}

#[async_trait]
impl ProtocolAdapter for ModbusTcpAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::ModbusTcp
    }

    async fn connect(&self) -> Result<(), ProtocolError> {
        let mut guard = self.ctx.lock().await;
        if guard.is_some() && self.signal.is_connected() {
            return Ok(());
        }
        self.signal.set(ConnectionStatus::Connecting, None);

        let addr = match self.resolve_addr().await {
            Ok(addr) => addr,
            Err(err) => {
                self.signal.set(ConnectionStatus::Error, Some(err.to_string()));
                return Err(err);
            }
        };

        info!(target: "gw.protocol", %addr, "connecting to modbus server");
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let result = timeout(
            connect_timeout,
            tokio_modbus::client::tcp::connect_slave(addr, Slave(self.config.unit_id)),
        )
        .await;

        match result {
            Ok(Ok(ctx)) => {
                *guard = Some(ctx);
                self.signal.set(ConnectionStatus::Connected, None);
                info!(target: "gw.protocol", %addr, "connected to modbus server");
                Ok(())
            }
            Ok(Err(err)) => {
                let err = ProtocolError::Connection(format!("{}: {}", addr, err));
                self.signal.set(ConnectionStatus::Error, Some(err.to_string()));
                Err(err)
            }
            Err(_) => {
                let err = ProtocolError::Timeout(format!(
                    "connect to {} exceeded {} ms",
                    addr, self.config.connect_timeout_ms
                ));
                self.signal.set(ConnectionStatus::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        // 丢弃 Context 即关闭底层 TCP 连接
        let _ = self.ctx.lock().await.take();
        self.signal.set(ConnectionStatus::Disconnected, None);
        Ok(())
    }

    async fn read_tags(&self, tags: &[Tag]) -> Result<Vec<ReadResult>, ProtocolError> {
        let mut guard = self.ctx.lock().await;
        let Some(ctx) = guard.as_mut() else {
            return Err(ProtocolError::NotConnected);
        };

        let mut results = Vec::with_capacity(tags.len());
        let mut transport_error: Option<ProtocolError> = None;
        for tag in tags {
            let timestamp = now_epoch_ms();
            if transport_error.is_some() {
                results.push(ReadResult::bad(&tag.id, timestamp));
                continue;
            }
            let TagAddress::ModbusTcp(address) = &tag.address else {
                warn!(target: "gw.protocol", tag_id = %tag.id, "tag address is not a modbus address");
                results.push(ReadResult::bad(&tag.id, timestamp));
                continue;
            };
            match self.read_point(ctx, address, tag.data_type).await {
                Ok(value) => results.push(ReadResult::good(&tag.id, value, timestamp)),
                Err(ReadError::Point(err)) => {
                    warn!(
                        target: "gw.protocol",
                        tag_id = %tag.id,
                        register = address.address,
                        error = %err,
                        "failed to read modbus point"
                    );
                    results.push(ReadResult::bad(&tag.id, timestamp));
                }
                Err(ReadError::Transport(err)) => {
                    warn!(
                        target: "gw.protocol",
                        tag_id = %tag.id,
                        error = %err,
                        "modbus transport failed"
                    );
                    results.push(ReadResult::bad(&tag.id, timestamp));
                    transport_error = Some(err);
                }
            }
        }

        if let Some(err) = transport_error {
            // 传输层失败后连接不可再用，交由上层重新连接
            *guard = None;
            self.signal.set(ConnectionStatus::Error, Some(err.to_string()));
            self.signal.error(err.to_string());
        }
        Ok(results)
    }

    fn status(&self) -> ConnectionStatus {
        self.signal.status()
    }

    fn is_connected(&self) -> bool {
        self.signal.is_connected()
    }

    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.signal.subscribe()
    }
}

fn register_count(address: &ModbusAddress, data_type: DataType) -> u16 {
    match data_type {
        DataType::String => address.length.unwrap_or(1).max(1),
        other => other.register_count(),
    }
}

/// 按字序把寄存器拼成 32/64 位原始值
fn combine_words(registers: &[u16], word_order: WordOrder) -> u64 {
    let ordered: Vec<u16> = match word_order {
        WordOrder::BigEndian => registers.to_vec(),
        WordOrder::LittleEndian => registers.iter().rev().copied().collect(),
    };
    ordered
        .iter()
        .fold(0u64, |acc, word| (acc << 16) | u64::from(*word))
}

/// 解析寄存器数据
pub(crate) fn decode_registers(
    registers: &[u16],
    data_type: DataType,
    address: &ModbusAddress,
) -> Result<TagValue, ProtocolError> {
    let needed = register_count(address, data_type) as usize;
    if registers.len() < needed {
        return Err(ProtocolError::DataParse(format!(
            "need {} registers for {:?}, got {}",
            needed,
            data_type,
            registers.len()
        )));
    }
    let words = &registers[..needed];

    let raw = match data_type {
        DataType::Bool => return Ok(TagValue::Bool(words[0] != 0)),
        DataType::String => {
            let bytes: Vec<u8> = words
                .iter()
                .flat_map(|word| word.to_be_bytes())
                .filter(|byte| *byte != 0)
                .collect();
            return Ok(TagValue::Text(String::from_utf8_lossy(&bytes).into_owned()));
        }
        DataType::Int16 => words[0] as i16 as f64,
        DataType::Uint16 => words[0] as f64,
        DataType::Int32 => combine_words(words, address.word_order) as u32 as i32 as f64,
        DataType::Uint32 => combine_words(words, address.word_order) as u32 as f64,
        DataType::Float32 => f32::from_bits(combine_words(words, address.word_order) as u32) as f64,
        DataType::Float64 => f64::from_bits(combine_words(words, address.word_order)),
    };

    // 应用缩放和偏移
    let scaled = match (address.scale, address.offset) {
        (Some(scale), Some(offset)) => raw * scale + offset,
        (Some(scale), None) => raw * scale,
        (None, Some(offset)) => raw + offset,
        (None, None) => raw,
    };
    Ok(TagValue::Number(scaled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(address: u16) -> ModbusAddress {
        ModbusAddress {
            register: RegisterKind::HoldingRegister,
            address,
            unit_id: None,
            length: None,
            word_order: WordOrder::BigEndian,
            scale: None,
            offset: None,
        }
    }

    #[test]
    fn test_decode_int16() {
        let address = holding(0);
        let value = decode_registers(&[100u16], DataType::Int16, &address).unwrap();
        assert_eq!(value, TagValue::Number(100.0));

        let value = decode_registers(&[(-100i16) as u16], DataType::Int16, &address).unwrap();
        assert_eq!(value, TagValue::Number(-100.0));
    }

    #[test]
    fn test_decode_float32_word_order() {
        let bits = 12.5f32.to_bits();
        let high = (bits >> 16) as u16;
        let low = (bits & 0xFFFF) as u16;

        let address = holding(0);
        let value = decode_registers(&[high, low], DataType::Float32, &address).unwrap();
        assert_eq!(value, TagValue::Number(12.5));

        let mut swapped = holding(0);
        swapped.word_order = WordOrder::LittleEndian;
        let value = decode_registers(&[low, high], DataType::Float32, &swapped).unwrap();
        assert_eq!(value, TagValue::Number(12.5));
    }

    #[test]
    fn test_decode_applies_scale_and_offset() {
        let mut address = holding(0);
        address.scale = Some(0.1);
        address.offset = Some(-5.0);
        let value = decode_registers(&[250u16], DataType::Uint16, &address).unwrap();
        match value {
            TagValue::Number(v) => assert!((v - 20.0).abs() < 1e-9),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_decode_string_and_short_response() {
        let mut address = holding(0);
        address.length = Some(2);
        let words = [u16::from_be_bytes(*b"OK"), u16::from_be_bytes([b'!', 0])];
        let value = decode_registers(&words, DataType::String, &address).unwrap();
        assert_eq!(value, TagValue::Text("OK!".to_string()));

        let err = decode_registers(&[1u16], DataType::Uint32, &holding(0)).unwrap_err();
        assert!(matches!(err, ProtocolError::DataParse(_)));
    }

    #[tokio::test]
    async fn test_read_without_connection_fails() {
        let adapter = ModbusTcpAdapter::new(ModbusTcpConfig {
            host: "127.0.0.1".to_string(),
            port: 502,
            unit_id: 1,
            connect_timeout_ms: 100,
            request_timeout_ms: 100,
        });
        let err = adapter.read_tags(&[]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
        assert!(!adapter.is_connected());
    }
}
