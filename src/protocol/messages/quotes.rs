use super::{market_from, registry, security_code, Message, MessageError};
use crate::protocol::codec::{check_record_count, format_server_time, Reader};
use crate::protocol::constants::{Category, Market};
use crate::protocol::frame::{MessageDefinition, MAX_PAYLOAD_LEN};
use crate::protocol::types::{
    BoardEntry, PriceLevel, QuoteListExtra, QuoteSnapshot, TopBoard,
};
use bytes::{BufMut, BytesMut};

/// 单次请求的证券数上限，受帧长度字段限制
pub const MAX_SECURITIES_PER_REQUEST: usize = (MAX_PAYLOAD_LEN - 10) / 7;

/// 按证券列表请求行情的公共请求体
fn encode_securities(securities: &[(Market, String)]) -> Result<Vec<u8>, MessageError> {
    if securities.is_empty() {
        return Err(MessageError::InvalidArgument("证券列表不能为空".into()));
    }
    if securities.len() > MAX_SECURITIES_PER_REQUEST {
        return Err(MessageError::InvalidArgument(format!(
            "证券数量过多: {}",
            securities.len()
        )));
    }
    let count = securities.len() as u16;

    let mut buf = BytesMut::with_capacity(10 + securities.len() * 7);
    buf.put_u16_le(5);
    buf.put_bytes(0, 6);
    buf.put_u16_le(count);
    for (market, code) in securities {
        buf.put_u8(market.as_u8());
        buf.put_slice(&security_code(code)?);
    }
    Ok(buf.to_vec())
}

/// 解析快照的公共部分（到盘口为止），价格单位为分，统一换算为厘
fn read_snapshot(reader: &mut Reader<'_>, levels: usize) -> Result<QuoteSnapshot, MessageError> {
    let market = market_from(reader.u8()? as u16)?;
    let code = reader.text(6)?;
    let active1 = reader.u16()?;

    let price = reader.fen()?;
    let pre_close = reader.fen_delta(price)?;
    let open = reader.fen_delta(price)?;
    let high = reader.fen_delta(price)?;
    let low = reader.fen_delta(price)?;
    let server_time = format_server_time(reader.varint()?);
    let after_hours = reader.varint()?;
    let volume = reader.varint()?;
    let cur_volume = reader.varint()?;
    let amount = reader.f32()?;
    let inside_volume = reader.varint()?;
    let outside_volume = reader.varint()?;
    let s_amount = reader.varint()?;
    let open_amount = reader.varint()?;

    let mut bids = Vec::with_capacity(levels);
    let mut asks = Vec::with_capacity(levels);
    for _ in 0..levels {
        let bid = reader.fen_delta(price)?;
        let ask = reader.fen_delta(price)?;
        let bid_volume = reader.varint()?;
        let ask_volume = reader.varint()?;
        bids.push(PriceLevel { price: bid, volume: bid_volume });
        asks.push(PriceLevel { price: ask, volume: ask_volume });
    }

    Ok(QuoteSnapshot {
        market,
        code,
        active1,
        price,
        pre_close,
        open,
        high,
        low,
        server_time,
        after_hours,
        volume,
        cur_volume,
        amount,
        inside_volume,
        outside_volume,
        s_amount,
        open_amount,
        bids,
        asks,
        flags: 0,
        rise_speed: 0,
        active2: 0,
        reserved: Vec::new(),
        extra: None,
    })
}

/// 五档行情明细
pub struct QuotesDetail;

impl Message for QuotesDetail {
    type Request = Vec<(Market, String)>;
    type Response = Vec<QuoteSnapshot>;

    fn definition(_: &Self::Request) -> MessageDefinition {
        registry::QUOTES_DETAIL
    }

    fn encode(req: &Self::Request) -> Result<Vec<u8>, MessageError> {
        encode_securities(req)
    }

    fn decode(_: &Self::Request, data: &[u8]) -> Result<Vec<QuoteSnapshot>, MessageError> {
        let mut reader = Reader::new(data);
        reader.skip(2)?;
        let count = reader.u16()? as usize;

        let mut quotes = Vec::with_capacity(count);
        for _ in 0..count {
            let mut quote = read_snapshot(&mut reader, 5)?;
            quote.flags = reader.i16()? as u16;
            quote.reserved = reader.take(4)?.to_vec();
            quote.rise_speed = reader.i16()?;
            quote.active2 = reader.u16()?;
            quotes.push(quote);
        }
        Ok(quotes)
    }
}

/// 行情列表响应（单档盘口 + 56 字节扩展字段）
fn decode_list(data: &[u8]) -> Result<Vec<QuoteSnapshot>, MessageError> {
    let mut reader = Reader::new(data);
    let _block = reader.u16()?;
    let count = reader.u16()? as usize;

    let mut quotes = Vec::with_capacity(count);
    for _ in 0..count {
        let mut quote = read_snapshot(&mut reader, 1)?;
        quote.flags = reader.u16()?;
        quote.rise_speed = reader.i16()?;
        let short_turnover = reader.i16()?;
        let min2_amount = reader.f32()?;
        let opening_rush = reader.i16()?;
        let mut reserved = reader.take(10)?.to_vec();
        let vol_rise_speed = reader.f32()?;
        let depth = reader.f32()?;
        reserved.extend_from_slice(reader.take(24)?);
        quote.active2 = reader.u16()?;
        quote.reserved = reserved;
        quote.extra = Some(QuoteListExtra {
            short_turnover,
            min2_amount,
            opening_rush,
            vol_rise_speed,
            depth,
        });
        quotes.push(quote);
    }
    Ok(quotes)
}

/// 按证券列表获取行情
pub struct Quotes;

impl Message for Quotes {
    type Request = Vec<(Market, String)>;
    type Response = Vec<QuoteSnapshot>;

    fn definition(_: &Self::Request) -> MessageDefinition {
        registry::QUOTES
    }

    fn encode(req: &Self::Request) -> Result<Vec<u8>, MessageError> {
        encode_securities(req)
    }

    fn decode(_: &Self::Request, data: &[u8]) -> Result<Vec<QuoteSnapshot>, MessageError> {
        decode_list(data)
    }
}

/// 按板块分类分页获取行情
pub struct QuotesList;

#[derive(Debug, Clone)]
pub struct QuotesListRequest {
    pub category: Category,
    pub start: u16,
    pub count: u16,
}

impl Message for QuotesList {
    type Request = QuotesListRequest;
    type Response = Vec<QuoteSnapshot>;

    fn definition(_: &QuotesListRequest) -> MessageDefinition {
        registry::QUOTES_LIST
    }

    fn encode(req: &QuotesListRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(18);
        for v in [req.category.as_u16(), 0, req.start, req.count, 0, 5, 0, 1, 0] {
            buf.put_u16_le(v);
        }
        Ok(buf.to_vec())
    }

    fn decode(_: &QuotesListRequest, data: &[u8]) -> Result<Vec<QuoteSnapshot>, MessageError> {
        decode_list(data)
    }
}

/// 排行榜
pub struct TopBoardMsg;

#[derive(Debug, Clone)]
pub struct TopBoardRequest {
    pub category: Category,
    pub size: u8,
}

const BOARD_RECORD_LEN: usize = 15;

impl Message for TopBoardMsg {
    type Request = TopBoardRequest;
    type Response = TopBoard;

    fn definition(_: &TopBoardRequest) -> MessageDefinition {
        registry::TOP_BOARD
    }

    fn encode(req: &TopBoardRequest) -> Result<Vec<u8>, MessageError> {
        let category = u8::try_from(req.category.as_u16()).map_err(|_| {
            MessageError::InvalidArgument(format!("分类超出范围: {}", req.category.as_u16()))
        })?;

        let mut buf = BytesMut::with_capacity(10);
        buf.put_u8(category);
        buf.put_u8(5);
        buf.put_slice(&[0, 0, 0, 0, 1, 0, 0]);
        buf.put_u8(req.size);
        Ok(buf.to_vec())
    }

    fn decode(_: &TopBoardRequest, data: &[u8]) -> Result<TopBoard, MessageError> {
        let mut reader = Reader::new(data);
        let size = reader.u8()? as usize;
        check_record_count(&reader, size * TopBoard::CATEGORIES.len(), BOARD_RECORD_LEN)?;

        let mut board = TopBoard::default();
        for index in 0..TopBoard::CATEGORIES.len() {
            let mut entries = Vec::with_capacity(size);
            for _ in 0..size {
                entries.push(BoardEntry {
                    market: market_from(reader.u8()? as u16)?,
                    code: reader.text(6)?,
                    price: reader.f32()?,
                    value: reader.f32()?,
                });
            }
            if let Some(slot) = board.category_mut(index) {
                *slot = entries;
            }
        }
        Ok(board)
    }
}
