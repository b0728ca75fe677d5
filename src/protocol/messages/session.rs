use super::{registry, Message, MessageError};
use crate::protocol::codec::gbk_to_utf8;
use crate::protocol::frame::MessageDefinition;

/// 连接消息
pub struct Connect;

impl Message for Connect {
    type Request = ();
    type Response = String;

    fn definition(_: &()) -> MessageDefinition {
        registry::CONNECT
    }

    fn encode(_: &()) -> Result<Vec<u8>, MessageError> {
        Ok(vec![0x01])
    }

    /// 前68字节未知，后续为GBK编码的服务器信息
    fn decode(_: &(), data: &[u8]) -> Result<String, MessageError> {
        if data.len() < 68 {
            return Err(MessageError::TruncatedValue { offset: data.len() });
        }
        Ok(gbk_to_utf8(&data[68..]))
    }
}

/// 心跳消息
pub struct Heartbeat;

impl Message for Heartbeat {
    type Request = ();
    type Response = ();

    fn definition(_: &()) -> MessageDefinition {
        registry::HEARTBEAT
    }

    fn encode(_: &()) -> Result<Vec<u8>, MessageError> {
        Ok(Vec::new())
    }

    fn decode(_: &(), _: &[u8]) -> Result<(), MessageError> {
        Ok(())
    }
}
