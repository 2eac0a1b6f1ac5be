//! FRI 数据报编解码
//!
//! 控制器与客户端之间的定长数据报格式（小端字节序）。
//! 编解码只操作调用方提供的缓冲区，不做堆分配。

use crate::message::{LbrCommand, LbrState};
use crate::session::decode_enum;
use crate::{N_JOINTS, N_WRENCH, ProtocolError};

// ============================================================================
// Message Types
// ============================================================================

/// 消息类型
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    // 控制器 → 客户端
    Monitor = 0x01, // 监控消息（每周期一次）

    // 客户端 → 控制器
    Command = 0x81, // 命令消息（对监控消息的应答）
}

impl MessageType {
    /// 从 u8 值创建 MessageType
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(MessageType::Monitor),
            0x81 => Some(MessageType::Command),
            _ => None,
        }
    }
}

// ============================================================================
// Message Header
// ============================================================================

/// 消息头长度
pub const HEADER_LEN: usize = 8;

/// 监控消息总长度
pub const MONITOR_MESSAGE_LEN: usize = HEADER_LEN + 8 + 8 + 4 + 4 + 6 * N_JOINTS * 8 + 8;

/// 命令消息总长度
pub const COMMAND_MESSAGE_LEN: usize = HEADER_LEN + (N_JOINTS + N_WRENCH + N_JOINTS) * 8;

/// 单个数据报的最大长度
pub const MAX_DATAGRAM_LEN: usize = 1500;

/// 命令消息标志：客户端处于命令模式，控制器应执行命令
pub const FLAG_COMMAND_ACTIVE: u8 = 0x01;

/// 消息头（8 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub msg_type: MessageType,
    pub flags: u8,
    pub length: u16,
    pub sequence: u32,
}

impl MessageHeader {
    pub fn new(msg_type: MessageType, length: u16, sequence: u32) -> Self {
        Self {
            msg_type,
            flags: 0,
            length,
            sequence,
        }
    }

    /// 编码消息头到缓冲区（调用方保证至少 8 字节）
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.msg_type as u8;
        buf[1] = self.flags;
        buf[2..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_le_bytes());
    }

    /// 从缓冲区解码消息头
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::TooShort {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }

        let msg_type =
            MessageType::from_u8(buf[0]).ok_or(ProtocolError::InvalidMessageType(buf[0]))?;
        Ok(Self {
            msg_type,
            flags: buf[1],
            length: u16::from_le_bytes([buf[2], buf[3]]),
            sequence: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

// ============================================================================
// Cursor helpers
// ============================================================================

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn u8(&mut self, value: u8) {
        self.buf[self.pos] = value;
        self.pos += 1;
    }

    fn u32(&mut self, value: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }

    fn f64(&mut self, value: f64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&value.to_le_bytes());
        self.pos += 8;
    }

    fn f64s(&mut self, values: &[f64]) {
        for v in values {
            self.f64(*v);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        u32::from_le_bytes(bytes)
    }

    fn f64(&mut self) -> f64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        f64::from_le_bytes(bytes)
    }

    fn f64s<const N: usize>(&mut self) -> [f64; N] {
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = self.f64();
        }
        out
    }
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if buf.len() < expected {
        return Err(ProtocolError::TooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Monitor Message
// ============================================================================

/// 监控消息（控制器 → 客户端）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorMessage {
    pub sequence: u32,
    pub state: LbrState,
}

impl MonitorMessage {
    /// 编码到缓冲区，返回写入字节数
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        check_len(buf, MONITOR_MESSAGE_LEN)?;
        MessageHeader::new(MessageType::Monitor, MONITOR_MESSAGE_LEN as u16, self.sequence)
            .encode(buf);

        let s = &self.state;
        let mut w = Writer::new(buf, HEADER_LEN);
        w.u8(s.session_state.into());
        w.u8(s.connection_quality.into());
        w.u8(s.safety_state.into());
        w.u8(s.operation_mode.into());
        w.u8(s.drive_state.into());
        w.u8(s.client_command_mode.into());
        w.u8(0); // reserved
        w.u8(0); // reserved
        w.f64(s.sample_time);
        w.u32(s.time_stamp_sec);
        w.u32(s.time_stamp_nano_sec);
        w.f64s(&s.measured_joint_position);
        w.f64s(&s.commanded_joint_position);
        w.f64s(&s.measured_torque);
        w.f64s(&s.commanded_torque);
        w.f64s(&s.external_torque);
        w.f64s(&s.ipo_joint_position);
        w.f64(s.tracking_performance);

        Ok(w.pos)
    }

    /// 从数据报解码
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let header = MessageHeader::decode(buf)?;
        if header.msg_type != MessageType::Monitor {
            return Err(ProtocolError::InvalidMessageType(header.msg_type as u8));
        }
        check_len(buf, MONITOR_MESSAGE_LEN)?;

        let mut r = Reader::new(buf, HEADER_LEN);
        let session_state = decode_enum("session_state", r.u8())?;
        let connection_quality = decode_enum("connection_quality", r.u8())?;
        let safety_state = decode_enum("safety_state", r.u8())?;
        let operation_mode = decode_enum("operation_mode", r.u8())?;
        let drive_state = decode_enum("drive_state", r.u8())?;
        let client_command_mode = decode_enum("client_command_mode", r.u8())?;
        r.u8();
        r.u8();

        let state = LbrState {
            session_state,
            connection_quality,
            safety_state,
            operation_mode,
            drive_state,
            client_command_mode,
            sample_time: r.f64(),
            time_stamp_sec: r.u32(),
            time_stamp_nano_sec: r.u32(),
            measured_joint_position: r.f64s(),
            commanded_joint_position: r.f64s(),
            measured_torque: r.f64s(),
            commanded_torque: r.f64s(),
            external_torque: r.f64s(),
            ipo_joint_position: r.f64s(),
            tracking_performance: r.f64(),
        };

        Ok(Self {
            sequence: header.sequence,
            state,
        })
    }
}

// ============================================================================
// Command Message
// ============================================================================

/// 命令消息（客户端 → 控制器）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandMessage {
    /// 应答的监控消息序列号
    pub sequence: u32,
    /// 客户端是否处于命令模式
    pub active: bool,
    pub command: LbrCommand,
}

impl CommandMessage {
    /// 编码到缓冲区，返回写入字节数
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        check_len(buf, COMMAND_MESSAGE_LEN)?;
        let mut header =
            MessageHeader::new(MessageType::Command, COMMAND_MESSAGE_LEN as u16, self.sequence);
        if self.active {
            header.flags |= FLAG_COMMAND_ACTIVE;
        }
        header.encode(buf);

        let mut w = Writer::new(buf, HEADER_LEN);
        w.f64s(&self.command.joint_position);
        w.f64s(&self.command.wrench);
        w.f64s(&self.command.torque);
        Ok(w.pos)
    }

    /// 从数据报解码
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let header = MessageHeader::decode(buf)?;
        if header.msg_type != MessageType::Command {
            return Err(ProtocolError::InvalidMessageType(header.msg_type as u8));
        }
        check_len(buf, COMMAND_MESSAGE_LEN)?;

        let mut r = Reader::new(buf, HEADER_LEN);
        Ok(Self {
            sequence: header.sequence,
            active: header.flags & FLAG_COMMAND_ACTIVE != 0,
            command: LbrCommand {
                joint_position: r.f64s(),
                wrench: r.f64s(),
                torque: r.f64s(),
            },
        })
    }
}
