use super::{registry, security_code, Message, MessageError};
use crate::protocol::codec::{date_to_u32, Reader};
use crate::protocol::constants::Market;
use crate::protocol::frame::MessageDefinition;
use crate::protocol::types::{HistoryOrders, OrderLevel, Price, TradeAction, Transaction};
use bytes::{BufMut, BytesMut};
use chrono::NaiveDate;

/// 当日分笔成交
pub struct TransactionMsg;

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub market: Market,
    pub code: String,
    pub start: u16,
    pub count: u16,
}

impl Message for TransactionMsg {
    type Request = TransactionRequest;
    type Response = Vec<Transaction>;

    fn definition(_: &TransactionRequest) -> MessageDefinition {
        registry::TRANSACTION
    }

    fn encode(req: &TransactionRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u16_le(req.market.as_u16());
        buf.put_slice(&security_code(&req.code)?);
        buf.put_u16_le(req.start);
        buf.put_u16_le(req.count);
        Ok(buf.to_vec())
    }

    fn decode(_: &TransactionRequest, data: &[u8]) -> Result<Vec<Transaction>, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u16()?;
        decode_ticks(&mut reader, count, true)
    }
}

/// 历史分笔成交
pub struct HistoryTransaction;

#[derive(Debug, Clone)]
pub struct HistoryTransactionRequest {
    pub market: Market,
    pub code: String,
    pub date: NaiveDate,
    pub start: u16,
    pub count: u16,
}

impl Message for HistoryTransaction {
    type Request = HistoryTransactionRequest;
    type Response = Vec<Transaction>;

    fn definition(_: &HistoryTransactionRequest) -> MessageDefinition {
        registry::HISTORY_TRANSACTION
    }

    fn encode(req: &HistoryTransactionRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u32_le(date_to_u32(req.date));
        buf.put_u16_le(req.market.as_u16());
        buf.put_slice(&security_code(&req.code)?);
        buf.put_u16_le(req.start);
        buf.put_u16_le(req.count);
        Ok(buf.to_vec())
    }

    fn decode(
        _: &HistoryTransactionRequest,
        data: &[u8],
    ) -> Result<Vec<Transaction>, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u16()?;
        reader.skip(4)?;
        decode_ticks(&mut reader, count, false)
    }
}

/// 成交价为逐笔累加的差值（单位分）；历史数据没有笔数字段
fn decode_ticks(
    reader: &mut Reader<'_>,
    count: u16,
    with_trans: bool,
) -> Result<Vec<Transaction>, MessageError> {
    let mut ticks = Vec::with_capacity(count as usize);
    let mut last_price = Price(0);

    for _ in 0..count {
        let (hour, minute) = reader.hour_minute()?;
        last_price = reader.fen_delta(last_price)?;
        let volume = reader.varint()?;
        let trans = if with_trans {
            Some(reader.varint()?)
        } else {
            None
        };
        let action = TradeAction::from_raw(reader.varint()?);
        let unknown = reader.varint()?;

        ticks.push(Transaction {
            time: format!("{:02}:{:02}", hour, minute),
            price: last_price,
            volume,
            trans,
            action,
            unknown,
        });
    }

    Ok(ticks)
}

/// 历史委托分布
pub struct HistoryOrdersMsg;

#[derive(Debug, Clone)]
pub struct HistoryOrdersRequest {
    pub market: Market,
    pub code: String,
    pub date: NaiveDate,
}

impl Message for HistoryOrdersMsg {
    type Request = HistoryOrdersRequest;
    type Response = HistoryOrders;

    fn definition(_: &HistoryOrdersRequest) -> MessageDefinition {
        registry::HISTORY_ORDERS
    }

    fn encode(req: &HistoryOrdersRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(11);
        buf.put_u32_le(date_to_u32(req.date));
        buf.put_u8(req.market.as_u8());
        buf.put_slice(&security_code(&req.code)?);
        Ok(buf.to_vec())
    }

    fn decode(_: &HistoryOrdersRequest, data: &[u8]) -> Result<HistoryOrders, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u16()?;
        let pre_close = reader.f32()?;

        let mut levels = Vec::with_capacity(count as usize);
        let mut last_price = Price(0);
        for _ in 0..count {
            last_price = reader.fen_delta(last_price)?;
            let unknown = reader.varint()?;
            let volume = reader.varint()?;
            levels.push(OrderLevel {
                price: last_price,
                unknown,
                volume,
            });
        }

        Ok(HistoryOrders { pre_close, levels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::encode_varint;

    fn tick(minutes: u16, price: i64, vol: i64, trans: Option<i64>, side: i64) -> Vec<u8> {
        let mut out = minutes.to_le_bytes().to_vec();
        out.extend(encode_varint(price));
        out.extend(encode_varint(vol));
        if let Some(t) = trans {
            out.extend(encode_varint(t));
        }
        out.extend(encode_varint(side));
        out.extend(encode_varint(0));
        out
    }

    #[test]
    fn current_ticks_accumulate_price() {
        let mut data = 3u16.to_le_bytes().to_vec();
        data.extend(tick(570, 1050, 20, Some(3), 0));
        data.extend(tick(570, 2, 5, Some(1), 1));
        data.extend(tick(571, -3, 8, Some(2), 2));

        let req = TransactionRequest {
            market: Market::SZ,
            code: "000001".into(),
            start: 0,
            count: 1800,
        };
        let ticks = TransactionMsg::decode(&req, &data).unwrap();
        assert_eq!(ticks[0].time, "09:30");
        assert_eq!(ticks[0].price, Price(10_500));
        assert_eq!(ticks[1].price, Price(10_520));
        assert_eq!(ticks[2].price, Price(10_490));
        assert_eq!(ticks[2].time, "09:31");
        assert_eq!(ticks[0].trans, Some(3));
        assert_eq!(
            ticks.iter().map(|t| t.action).collect::<Vec<_>>(),
            vec![TradeAction::Buy, TradeAction::Sell, TradeAction::Neutral]
        );
    }

    #[test]
    fn history_ticks_have_no_trans() {
        let mut data = 1u16.to_le_bytes().to_vec();
        data.extend([0, 0, 0, 0]);
        data.extend(tick(900, 1234, 50, None, 1));

        let req = HistoryTransactionRequest {
            market: Market::SH,
            code: "600000".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            start: 0,
            count: 2000,
        };
        let body = HistoryTransaction::encode(&req).unwrap();
        assert_eq!(body[..4], 20240315u32.to_le_bytes());
        assert_eq!(body.len(), 16);

        let ticks = HistoryTransaction::decode(&req, &data).unwrap();
        assert_eq!(ticks[0].time, "15:00");
        assert_eq!(ticks[0].trans, None);
        assert_eq!(ticks[0].action, TradeAction::Sell);
    }

    #[test]
    fn history_orders() {
        let mut data = 2u16.to_le_bytes().to_vec();
        data.extend(10.0f32.to_le_bytes());
        for (p, u, v) in [(990, 1, 300), (1, 0, 500)] {
            data.extend(encode_varint(p));
            data.extend(encode_varint(u));
            data.extend(encode_varint(v));
        }

        let req = HistoryOrdersRequest {
            market: Market::SZ,
            code: "000001".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        };
        assert_eq!(HistoryOrdersMsg::encode(&req).unwrap().len(), 11);

        let orders = HistoryOrdersMsg::decode(&req, &data).unwrap();
        assert_eq!(orders.pre_close, 10.0);
        assert_eq!(orders.levels[1].price, Price(9_910));
        assert_eq!(orders.levels[1].volume, 500);
    }

    #[test]
    fn oversized_price_delta_is_error() {
        let mut data = 1u16.to_le_bytes().to_vec();
        data.extend(570u16.to_le_bytes());
        // 2^62 - 1 分，换算为厘时溢出
        data.extend([0xBF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
        data.extend([0x01, 0x01, 0x00, 0x00]);

        let req = TransactionRequest {
            market: Market::SZ,
            code: "000001".into(),
            start: 0,
            count: 1,
        };
        assert!(matches!(
            TransactionMsg::decode(&req, &data),
            Err(MessageError::ValueOverflow { offset: 4 })
        ));
    }
}
