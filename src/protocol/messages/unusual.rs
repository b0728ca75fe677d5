use super::{market_from, registry, Message, MessageError};
use crate::protocol::codec::{check_record_count, Reader};
use crate::protocol::constants::Market;
use crate::protocol::frame::MessageDefinition;
use crate::protocol::types::UnusualEvent;
use bytes::{BufMut, BytesMut};
use log::warn;

/// 异动（主力监控）
pub struct Unusual;

#[derive(Debug, Clone)]
pub struct UnusualRequest {
    pub market: Market,
    pub start: u32,
    pub count: u32,
}

const RECORD_LEN: usize = 32;

impl Message for Unusual {
    type Request = UnusualRequest;
    type Response = Vec<UnusualEvent>;

    fn definition(_: &UnusualRequest) -> MessageDefinition {
        registry::UNUSUAL
    }

    fn encode(req: &UnusualRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(10);
        buf.put_u16_le(req.market.as_u16());
        buf.put_u32_le(req.start);
        buf.put_u32_le(req.count);
        Ok(buf.to_vec())
    }

    fn decode(_: &UnusualRequest, data: &[u8]) -> Result<Vec<UnusualEvent>, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u16()? as usize;
        check_record_count(&reader, count, RECORD_LEN)?;

        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            let mut record = Reader::new(reader.take(RECORD_LEN)?);

            let market = market_from(record.u16()?)?;
            let code = record.text(6)?;
            record.skip(1)?;
            let kind = record.u8()?;
            record.skip(1)?;
            let index = record.u16()?;
            record.skip(2)?;
            let payload: [u8; 13] = record.array()?;
            record.skip(1)?;
            let hour = record.u8()?;
            let minute_sec = record.u16()?;

            let (desc, value) = describe_event(kind, &payload).unwrap_or_else(|| {
                warn!("未知的异动类型 0x{:02X}: {}", kind, code);
                (String::new(), String::new())
            });

            events.push(UnusualEvent {
                index,
                market,
                code,
                time: format!("{:02}:{:02}:{:02}", hour, minute_sec / 100, minute_sec % 100),
                kind,
                desc,
                value,
            });
        }

        Ok(events)
    }
}

fn f32_at(payload: &[u8; 13], offset: usize) -> f32 {
    f32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}

fn percent(v: f32) -> String {
    format!("{:.2}%", v * 100.0)
}

fn ratio(a: f32, b: f32) -> String {
    format!("{:.2}/{:.2}", a, b)
}

/// 按类型解释异动记录的 13 字节数据，返回 (描述, 数值)
///
/// 通用布局为 `u8 v1, f32 v2, f32 v3, f32 v4`；类型 0x14 在偏移 1 处另有子类型。
/// 未知类型返回 `None`。
pub fn describe_event(kind: u8, payload: &[u8; 13]) -> Option<(String, String)> {
    let v1 = payload[0];
    let v2 = f32_at(payload, 1);
    let v3 = f32_at(payload, 5);
    let v4 = f32_at(payload, 9);

    let (desc, value) = match kind {
        0x03 => (
            format!("主力{}", if v1 == 0 { "买入" } else { "卖出" }),
            ratio(v2, v3),
        ),
        0x04 => ("加速拉升".to_string(), percent(v2)),
        0x05 => ("加速下跌".to_string(), String::new()),
        0x06 => ("低位反弹".to_string(), percent(v2)),
        0x07 => ("高位回落".to_string(), percent(v2)),
        0x08 => ("撑杆跳高".to_string(), percent(v2)),
        0x09 => ("平台跳水".to_string(), percent(v2)),
        0x0A => (
            format!("单笔冲{}", if v2 < 0.0 { "跌" } else { "涨" }),
            percent(v2),
        ),
        0x0B => {
            let trend = if v3 == 0.0 {
                "平"
            } else if v3 < 0.0 {
                "跌"
            } else {
                "涨"
            };
            let change = if v3 == 0.0 { String::new() } else { percent(v3) };
            (format!("区间放量{}", trend), format!("{:.1}倍{}", v2, change))
        }
        0x0C => ("区间缩量".to_string(), String::new()),
        0x10 => ("大单托盘".to_string(), ratio(v4, v3)),
        0x11 => ("大单压盘".to_string(), ratio(v2, v3)),
        0x12 => ("大单锁盘".to_string(), String::new()),
        0x13 => ("竞价试买".to_string(), ratio(v2, v3)),
        0x14 => {
            let sub_kind = payload[1];
            let v2 = f32_at(payload, 2);
            let v3 = f32_at(payload, 6);
            let direction = if v1 == 0 { "涨" } else { "跌" };
            let desc = match sub_kind {
                0x01 => format!("逼近{}停", direction),
                0x02 => format!("封{}停板", direction),
                0x04 => format!("封{}大减", direction),
                0x05 => format!("打开{}停", direction),
                _ => String::new(),
            };
            (desc, ratio(v2, v3))
        }
        0x15 => {
            let desc = match v1 {
                0x00 => "尾盘??",
                0x01 => "尾盘对倒",
                0x02 => "尾盘拉升",
                _ => "尾盘???",
            };
            (desc.to_string(), format!("{:.2}%/{:.2}", v2 * 100.0, v3))
        }
        0x16 => (
            format!("盘中{}势", if v2 < 0.0 { "弱" } else { "强" }),
            percent(v2),
        ),
        0x1D => ("急速拉升".to_string(), percent(v2)),
        0x1E => ("急速下跌".to_string(), percent(v2)),
        _ => return None,
    };

    Some((desc, value))
}
