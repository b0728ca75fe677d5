//! 协议帧格式定义和编解码
//!
//! 请求帧：`u8 flag | u32 customize | u8 version | u16 len | u16 len | u16 msg_id | payload`，
//! 其中 `len = 2 + payload.len()`。
//!
//! 响应帧头（16字节）：`u32 prefix | u8 flag | u32 customize | u8 unknown | u16 msg_id |
//! u16 zip_len | u16 len`，随后是 `zip_len` 字节的（可能压缩的）数据。

use crate::protocol::constants::{FLAG_PLAIN, FLAG_ZIP, FRAME_VERSION, PREFIX_RESP};
use bytes::{BufMut, BytesMut};
use flate2::read::ZlibDecoder;
use std::io::Read;
use thiserror::Error;

/// 请求帧头长度
pub const HEADER_LEN: usize = 10;

/// 响应帧头长度
pub const RESPONSE_HEADER_LEN: usize = 16;

/// 长度字段包含 2 字节 msg_id
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 2;

/// 单个接口的不可变描述
///
/// 在注册表构建时以常量形式创建，之后只读，可跨调用、跨任务共享。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDefinition {
    pub name: &'static str,
    pub opcode: u16,
    pub default_flag: u8,
    pub customize: u32,
    pub compress: bool,
}

impl MessageDefinition {
    pub const fn new(name: &'static str, opcode: u16) -> Self {
        Self {
            name,
            opcode,
            default_flag: FLAG_PLAIN,
            customize: 0,
            compress: false,
        }
    }

    pub const fn with_customize(mut self, customize: u32) -> Self {
        self.customize = customize;
        self
    }

    pub const fn with_flag(mut self, flag: u8) -> Self {
        self.default_flag = flag;
        self
    }

    pub const fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// 实际写入帧头的标志
    ///
    /// 仅当需要压缩且标志仍为默认值 0x0C 时升级为 0x1C；显式指定的标志保持不变。
    pub const fn wire_flag(&self) -> u8 {
        if self.compress && self.default_flag == FLAG_PLAIN {
            FLAG_ZIP
        } else {
            self.default_flag
        }
    }
}

/// 请求帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub flag: u8,
    pub customize: u32,
    pub msg_id: u16,
    pub payload: Vec<u8>,
}

impl RequestFrame {
    /// 按接口描述创建请求帧
    pub fn new(def: &MessageDefinition, payload: Vec<u8>) -> Self {
        Self {
            flag: def.wire_flag(),
            customize: def.customize,
            msg_id: def.opcode,
            payload,
        }
    }

    /// 编码为字节数组，请求体超过长度字段的表示范围时报错
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge(self.payload.len()));
        }
        let length = (self.payload.len() + 2) as u16;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 2 + self.payload.len());

        buf.put_u8(self.flag);
        buf.put_u32_le(self.customize);
        buf.put_u8(FRAME_VERSION);
        // Length (重复两次)
        buf.put_u16_le(length);
        buf.put_u16_le(length);
        buf.put_u16_le(self.msg_id);
        buf.put_slice(&self.payload);

        Ok(buf.to_vec())
    }

    /// 从字节数组解码
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = decode_header(bytes)?;
        if header.body_length < 2 {
            return Err(FrameError::Malformed("帧体缺少 msg_id"));
        }
        let end = HEADER_LEN + header.body_length as usize;
        if bytes.len() < end {
            return Err(FrameError::Malformed("帧体长度不足"));
        }

        let msg_id = u16::from_le_bytes([bytes[HEADER_LEN], bytes[HEADER_LEN + 1]]);
        Ok(Self {
            flag: header.flag,
            customize: header.customize,
            msg_id,
            payload: bytes[HEADER_LEN + 2..end].to_vec(),
        })
    }
}

/// 按接口描述编码请求
pub fn encode(def: &MessageDefinition, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    RequestFrame::new(def, payload.to_vec()).encode()
}

/// 请求帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub flag: u8,
    pub customize: u32,
    /// 帧体长度（含 2 字节 msg_id）
    pub body_length: u16,
}

/// 解析请求帧头
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::Malformed("帧头长度不足"));
    }

    let flag = bytes[0];
    let customize = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let length1 = u16::from_le_bytes([bytes[6], bytes[7]]);
    let length2 = u16::from_le_bytes([bytes[8], bytes[9]]);

    if length1 != length2 {
        return Err(FrameError::Malformed("长度字段不一致"));
    }

    Ok(FrameHeader {
        flag,
        customize,
        body_length: length1,
    })
}

/// 响应帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub flag: u8,
    pub customize: u32,
    pub unknown: u8,
    pub msg_id: u16,
    pub zip_length: u16,
    pub length: u16,
}

impl ResponseHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < RESPONSE_HEADER_LEN {
            return Err(FrameError::Malformed("响应帧头长度不足"));
        }

        // 前缀是大端序：B1CB7400
        let prefix = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if prefix != PREFIX_RESP {
            return Err(FrameError::InvalidPrefix(prefix));
        }

        Ok(Self {
            flag: bytes[4],
            customize: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            unknown: bytes[9],
            msg_id: u16::from_le_bytes([bytes[10], bytes[11]]),
            zip_length: u16::from_le_bytes([bytes[12], bytes[13]]),
            length: u16::from_le_bytes([bytes[14], bytes[15]]),
        })
    }

    /// 压缩长度与原始长度不同即为 zlib 压缩数据
    pub fn is_compressed(&self) -> bool {
        self.zip_length != self.length
    }
}

/// 响应帧
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    pub header: ResponseHeader,
    data: Vec<u8>,
}

impl ResponseFrame {
    /// 由帧头和原始帧体构造，按需解压
    pub fn from_parts(header: ResponseHeader, body: Vec<u8>) -> Result<Self, FrameError> {
        let data = if header.is_compressed() {
            let mut decoder = ZlibDecoder::new(body.as_slice());
            let mut plain = Vec::with_capacity(header.length as usize);
            decoder
                .read_to_end(&mut plain)
                .map_err(|e| FrameError::Decompression(e.to_string()))?;
            plain
        } else {
            body
        };

        // 验证解压后的数据长度
        if data.len() != header.length as usize {
            return Err(FrameError::Malformed("解压后长度不匹配"));
        }

        Ok(Self { header, data })
    }

    /// 从完整字节数组解码
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = ResponseHeader::parse(bytes)?;
        let end = RESPONSE_HEADER_LEN + header.zip_length as usize;
        if bytes.len() < end {
            return Err(FrameError::Malformed("响应帧体长度不足"));
        }
        Self::from_parts(header, bytes[RESPONSE_HEADER_LEN..end].to_vec())
    }

    /// 解压后的数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// 帧错误类型
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("帧格式错误: {0}")]
    Malformed(&'static str),
    #[error("无效的帧头: 0x{0:08X}")]
    InvalidPrefix(u32),
    #[error("解压错误: {0}")]
    Decompression(String),
    #[error("响应类型不匹配: 期望 0x{expected:04X}, 得到 0x{actual:04X}")]
    UnexpectedMessageType { expected: u16, actual: u16 },
    #[error("请求体过长: {0} 字节")]
    PayloadTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const COUNT: MessageDefinition = MessageDefinition::new("count", 0x044E);

    #[test]
    fn encode_layout() {
        let bytes = encode(&COUNT, &[0x01, 0x00]).unwrap();
        assert_eq!(
            bytes,
            vec![0x0C, 0, 0, 0, 0, 0x01, 0x04, 0x00, 0x04, 0x00, 0x4E, 0x04, 0x01, 0x00]
        );
    }

    #[test]
    fn header_round_trip() {
        let def = MessageDefinition::new("login", 0x2454).with_customize(1);
        let payload = vec![0xAB; 80];
        let bytes = encode(&def, &payload).unwrap();

        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.customize, 1);
        assert_eq!(header.body_length as usize, payload.len() + 2);

        let frame = RequestFrame::decode(&bytes).unwrap();
        assert_eq!(frame.msg_id, 0x2454);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn compress_upgrades_default_flag_only() {
        let zipped = MessageDefinition::new("zip", 0x0001).compressed();
        assert_eq!(encode(&zipped, &[]).unwrap()[0], FLAG_ZIP);

        let explicit = MessageDefinition::new("explicit", 0x0001)
            .with_flag(0x2C)
            .compressed();
        assert_eq!(encode(&explicit, &[]).unwrap()[0], 0x2C);

        assert_eq!(encode(&COUNT, &[]).unwrap()[0], FLAG_PLAIN);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let largest = vec![0u8; MAX_PAYLOAD_LEN];
        let bytes = encode(&COUNT, &largest).unwrap();
        assert_eq!(decode_header(&bytes).unwrap().body_length, u16::MAX);

        let payload = vec![0u8; 70_010];
        assert!(matches!(
            encode(&COUNT, &payload),
            Err(FrameError::PayloadTooLarge(70_010))
        ));
    }

    #[test]
    fn decode_header_rejects_short_and_mismatched() {
        assert!(matches!(
            decode_header(&[0x0C, 0, 0, 0, 0, 1, 2, 0]),
            Err(FrameError::Malformed(_))
        ));

        let mut bytes = encode(&COUNT, &[1, 2, 3]).unwrap();
        bytes[8] = 0x09;
        assert!(matches!(decode_header(&bytes), Err(FrameError::Malformed(_))));
    }

    fn response_bytes(msg_id: u16, body: &[u8], plain_len: u16) -> Vec<u8> {
        let mut bytes = vec![0xB1, 0xCB, 0x74, 0x00, 0x1C, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&msg_id.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&plain_len.to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn response_plain() {
        let bytes = response_bytes(0x044E, &[0xC8, 0x01], 2);
        let frame = ResponseFrame::decode(&bytes).unwrap();
        assert_eq!(frame.header.msg_id, 0x044E);
        assert!(!frame.header.is_compressed());
        assert_eq!(frame.data(), &[0xC8, 0x01]);
    }

    #[test]
    fn response_compressed() {
        let plain = vec![7u8; 300];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        let zipped = encoder.finish().unwrap();

        let bytes = response_bytes(0x0523, &zipped, plain.len() as u16);
        let frame = ResponseFrame::decode(&bytes).unwrap();
        assert!(frame.header.is_compressed());
        assert_eq!(frame.into_data(), plain);
    }

    #[test]
    fn response_rejects_bad_prefix() {
        let mut bytes = response_bytes(0x044E, &[0, 0], 2);
        bytes[0] = 0x00;
        assert!(matches!(
            ResponseFrame::decode(&bytes),
            Err(FrameError::InvalidPrefix(_))
        ));
    }
}
