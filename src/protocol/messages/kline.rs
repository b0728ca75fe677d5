use super::{registry, security_code, Message, MessageError};
use crate::protocol::codec::{decode_kline_datetime, Reader};
use crate::protocol::constants::{Market, Period};
use crate::protocol::frame::MessageDefinition;
use crate::protocol::types::{KlineBar, Price};
use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDateTime};

/// K线接口的两个操作码，请求与响应格式相同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KlineVariant {
    #[default]
    Standard,
    Offset,
}

/// K线消息
pub struct Kline;

#[derive(Debug, Clone)]
pub struct KlineRequest {
    pub market: Market,
    pub code: String,
    pub period: Period,
    /// 从最新一根往前的偏移
    pub start: u16,
    pub count: u16,
    pub variant: KlineVariant,
}

impl Message for Kline {
    type Request = KlineRequest;
    type Response = Vec<KlineBar>;

    fn definition(req: &KlineRequest) -> MessageDefinition {
        match req.variant {
            KlineVariant::Standard => registry::KLINE,
            KlineVariant::Offset => registry::KLINE_OFFSET,
        }
    }

    fn encode(req: &KlineRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(26);
        buf.put_u16_le(req.market.as_u16());
        buf.put_slice(&security_code(&req.code)?);
        buf.put_u16_le(req.period.as_u16());
        buf.put_u16_le(1);
        buf.put_u16_le(req.start);
        buf.put_u16_le(req.count);
        buf.put_bytes(0, 10);
        Ok(buf.to_vec())
    }

    fn decode(req: &KlineRequest, data: &[u8]) -> Result<Vec<KlineBar>, MessageError> {
        decode_bars(data, req.period)
    }
}

/// 解码K线响应
///
/// 价格为累加差值（单位厘）：开盘相对上一根收盘，收/高/低相对本根开盘。
pub fn decode_bars(data: &[u8], period: Period) -> Result<Vec<KlineBar>, MessageError> {
    let minute_category = period.is_minute_category();
    let mut reader = Reader::new(data);
    let count = reader.u16()? as usize;

    let mut bars = Vec::with_capacity(count);
    let mut last = Price(0);

    for _ in 0..count {
        let raw = reader.u32()?;
        let datetime =
            decode_kline_datetime(raw, minute_category).ok_or(MessageError::InvalidDate(raw))?;

        let open = reader.li_delta(last)?;
        let close = reader.li_delta(open)?;
        let high = reader.li_delta(open)?;
        let low = reader.li_delta(open)?;
        last = close;

        let volume = reader.f32()?;
        let amount = reader.f32()?;
        let up_down = read_up_down(&mut reader, datetime, minute_category)?;

        bars.push(KlineBar {
            datetime,
            open,
            close,
            high,
            low,
            volume,
            amount,
            up_down,
        });
    }

    Ok(bars)
}

/// 指数K线在每根末尾多出 4 字节的涨跌家数，但协议中没有标志位。
/// 若后续 4 字节能解析为不早于本根年份的日期，则它属于下一根；否则按涨跌家数读取。
fn read_up_down(
    reader: &mut Reader<'_>,
    current: NaiveDateTime,
    minute_category: bool,
) -> Result<Option<(u16, u16)>, MessageError> {
    if reader.is_empty() {
        return Ok(None);
    }

    let next_is_date = reader
        .peek_u32()
        .and_then(|raw| decode_kline_datetime(raw, minute_category))
        .is_some_and(|next| next.year() >= current.year());

    if next_is_date {
        return Ok(None);
    }

    let up = reader.u16()?;
    let down = reader.u16()?;
    Ok(Some((up, down)))
}
