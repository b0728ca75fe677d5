use super::{market_from, registry, security_code, Message, MessageError};
use crate::protocol::codec::{format_server_time, Reader};
use crate::protocol::constants::Market;
use crate::protocol::frame::MessageDefinition;
use crate::protocol::types::{ChartPoint, ChartSampling, IndexInfo, IndexMinute, Price};
use bytes::{BufMut, BytesMut};

/// 单只证券的请求参数
#[derive(Debug, Clone)]
pub struct SecurityRequest {
    pub market: Market,
    pub code: String,
}

impl SecurityRequest {
    pub fn new(market: Market, code: impl Into<String>) -> Self {
        Self {
            market,
            code: code.into(),
        }
    }
}

/// 指数概况
pub struct IndexInfoMsg;

impl Message for IndexInfoMsg {
    type Request = SecurityRequest;
    type Response = IndexInfo;

    fn definition(_: &SecurityRequest) -> MessageDefinition {
        registry::INDEX_INFO
    }

    fn encode(req: &SecurityRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u16_le(req.market.as_u16());
        buf.put_slice(&security_code(&req.code)?);
        buf.put_u32_le(0);
        Ok(buf.to_vec())
    }

    fn decode(_: &SecurityRequest, data: &[u8]) -> Result<IndexInfo, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u32()?;
        let market = market_from(reader.u8()? as u16)?;
        let code = reader.text(6)?;
        let active = reader.u16()?;

        let close = reader.fen()?;
        let pre_close_offset = reader.pos();
        let pre_close_diff = reader.fen()?;
        let pre_close = close
            .checked_add(pre_close_diff)
            .ok_or(MessageError::ValueOverflow { offset: pre_close_offset })?;
        let open = reader.fen_delta(close)?;
        let high = reader.fen_delta(close)?;
        let low = reader.fen_delta(close)?;
        let server_time = format_server_time(reader.varint()?);
        let after_hours = reader.varint()?;
        let volume = reader.varint()?;
        let cur_volume = reader.varint()?;
        let amount = reader.f32()?;

        // 18 个字段中只有开盘金额与涨跌家数含义明确，其余原样保留
        let mut tail = [0i64; 18];
        for value in tail.iter_mut() {
            *value = reader.varint()?;
        }
        let open_amount = tail[2];
        let up_count = tail[6];
        let down_count = tail[7];
        let reserved = tail
            .iter()
            .enumerate()
            .filter(|(i, _)| !matches!(i, 2 | 6 | 7))
            .map(|(_, v)| *v)
            .collect();

        let mut minutes = Vec::new();
        for _ in 0..count {
            minutes.push(IndexMinute {
                price: reader.varint()?,
                unknown: reader.varint()?,
                volume: reader.varint()?,
            });
        }

        Ok(IndexInfo {
            market,
            code,
            active,
            close,
            pre_close,
            diff: Price(-pre_close_diff.0),
            open,
            high,
            low,
            server_time,
            after_hours,
            volume,
            cur_volume,
            amount,
            open_amount,
            up_count,
            down_count,
            reserved,
            minutes,
        })
    }
}

/// 指数分时图
pub struct IndexChart;

#[derive(Debug, Clone)]
pub struct IndexChartRequest {
    pub market: Market,
    pub code: String,
    pub start: u16,
    pub count: u16,
}

impl IndexChartRequest {
    /// 服务器默认返回全天数据时使用的数量
    pub const DEFAULT_COUNT: u16 = 0xBA00;

    pub fn new(market: Market, code: impl Into<String>) -> Self {
        Self {
            market,
            code: code.into(),
            start: 0,
            count: Self::DEFAULT_COUNT,
        }
    }
}

impl Message for IndexChart {
    type Request = IndexChartRequest;
    type Response = Vec<ChartPoint>;

    fn definition(_: &IndexChartRequest) -> MessageDefinition {
        registry::INDEX_CHART
    }

    fn encode(req: &IndexChartRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u16_le(req.market.as_u16());
        buf.put_slice(&security_code(&req.code)?);
        buf.put_u16_le(req.start);
        buf.put_u16_le(req.count);
        Ok(buf.to_vec())
    }

    /// 价格与 fast 均为相对首个非零值的差值
    fn decode(_: &IndexChartRequest, data: &[u8]) -> Result<Vec<ChartPoint>, MessageError> {
        let mut reader = Reader::new(data);
        let num = reader.u16()?;
        reader.skip(2)?;

        let mut points = Vec::with_capacity(num as usize);
        let mut base_price = 0i64;
        let mut base_fast = 0i64;

        for _ in 0..num {
            let price = reader.varint()?;
            let fast = reader.varint()?;
            let amount = reader.varint()?;

            points.push(ChartPoint {
                price: base_price + price,
                fast: base_fast + fast,
                amount,
            });

            if base_price == 0 {
                base_price = price;
            }
            if base_fast == 0 {
                base_fast = fast;
            }
        }

        Ok(points)
    }
}

/// 分时抽样价格
pub struct ChartSamplingMsg;

const SAMPLING_TAIL: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x00, 0x00, 0x00, 0x00, 0x00,
];

impl Message for ChartSamplingMsg {
    type Request = SecurityRequest;
    type Response = ChartSampling;

    fn definition(_: &SecurityRequest) -> MessageDefinition {
        registry::CHART_SAMPLING
    }

    fn encode(req: &SecurityRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(8 + SAMPLING_TAIL.len());
        buf.put_u16_le(req.market.as_u16());
        buf.put_slice(&security_code(&req.code)?);
        buf.put_slice(&SAMPLING_TAIL);
        Ok(buf.to_vec())
    }

    fn decode(_: &SecurityRequest, data: &[u8]) -> Result<ChartSampling, MessageError> {
        let mut reader = Reader::new(data);
        let market = market_from(reader.u16()?)?;
        let code = reader.text(6)?;

        let mut reader = Reader::at(data, 34);
        let num = reader.u16()?;
        let pre_close = reader.f32()?;
        reader.skip(2)?;

        let mut prices = Vec::with_capacity(num as usize);
        for _ in 0..num {
            prices.push(reader.f32()?);
        }

        Ok(ChartSampling {
            market,
            code,
            pre_close,
            prices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::encode_varint;

    #[test]
    fn chart_points_relative_to_first() {
        let mut data = vec![3, 0, 0, 0];
        for (p, f, a) in [(3000, 2990, 10), (5, 3, 20), (-2, 1, 30)] {
            data.extend(encode_varint(p));
            data.extend(encode_varint(f));
            data.extend(encode_varint(a));
        }

        let req = IndexChartRequest::new(Market::SH, "000001");
        let points = IndexChart::decode(&req, &data).unwrap();
        assert_eq!(points[0], ChartPoint { price: 3000, fast: 2990, amount: 10 });
        assert_eq!(points[1], ChartPoint { price: 3005, fast: 2993, amount: 20 });
        assert_eq!(points[2], ChartPoint { price: 2998, fast: 2991, amount: 30 });
    }

    #[test]
    fn sampling_request_and_response() {
        let req = SecurityRequest::new(Market::SZ, "000001");
        let body = ChartSamplingMsg::encode(&req).unwrap();
        assert_eq!(hex::encode(&body[8..]), "0000000000000000000000000000000001001400000000010000000000");

        let mut data = vec![0u8; 42];
        data[2..8].copy_from_slice(b"000001");
        data[34..36].copy_from_slice(&2u16.to_le_bytes());
        data[36..40].copy_from_slice(&10.5f32.to_le_bytes());
        data.extend(10.6f32.to_le_bytes());
        data.extend(10.4f32.to_le_bytes());

        let sampling = ChartSamplingMsg::decode(&req, &data).unwrap();
        assert_eq!(sampling.market, Market::SZ);
        assert_eq!(sampling.code, "000001");
        assert_eq!(sampling.pre_close, 10.5);
        assert_eq!(sampling.prices, vec![10.6, 10.4]);
    }

    #[test]
    fn index_info_summary() {
        let mut data = 1u32.to_le_bytes().to_vec();
        data.push(1);
        data.extend(b"000001");
        data.extend(7u16.to_le_bytes());
        for v in [300_000, 1_000, -500, 2_000, -1_500, 14_305_000, 0, 123_456, 789] {
            data.extend(encode_varint(v));
        }
        data.extend(1.5e11f32.to_le_bytes());
        for v in 0..18i64 {
            data.extend(encode_varint(v * 10));
        }
        for v in [5, 0, 100] {
            data.extend(encode_varint(v));
        }

        let req = SecurityRequest::new(Market::SH, "000001");
        let info = IndexInfoMsg::decode(&req, &data).unwrap();
        assert_eq!(info.close, Price(3_000_000));
        assert_eq!(info.pre_close, Price(3_010_000));
        assert_eq!(info.diff, Price(-10_000));
        assert_eq!(info.low, Price(2_985_000));
        assert_eq!(info.server_time, "14:30:30.000");
        assert_eq!(info.open_amount, 20);
        assert_eq!((info.up_count, info.down_count), (60, 70));
        assert_eq!(info.reserved.len(), 15);
        assert_eq!(info.minutes.len(), 1);
        assert_eq!(info.minutes[0].volume, 100);
    }
}
