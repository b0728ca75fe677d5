//! 扩展行情（期货等）接口，全部使用 customize = 1

use super::{registry, Message, MessageError};
use crate::protocol::codec::{check_record_count, fixed_bytes, utf8_to_gbk, Reader};
use crate::protocol::frame::{MessageDefinition, MAX_PAYLOAD_LEN};
use crate::protocol::types::{
    ExLoginInfo, ExServerInfo, FuturesCategory, FuturesInstrument, FuturesLevel, FuturesListPage,
    FuturesQuote,
};
use bytes::{BufMut, BytesMut};
use chrono::{NaiveDate, NaiveDateTime};

const LOGIN_BLOB: [u8; 80] = [
    0xe5, 0xbb, 0x1c, 0x2f, 0xaf, 0xe5, 0x25, 0x94, 0x1f, 0x32, 0xc6, 0xe5, 0xd5, 0x3d, 0xfb, 0x41,
    0x5b, 0x73, 0x4c, 0xc9, 0xcd, 0xbf, 0x0a, 0xc9, 0x20, 0x21, 0xbf, 0xdd, 0x1e, 0xb0, 0x6d, 0x22,
    0xd0, 0x08, 0x88, 0x4c, 0x16, 0x11, 0xcb, 0x13, 0x78, 0xf6, 0xab, 0xd8, 0x24, 0xd8, 0x99, 0xd2,
    0x1f, 0x32, 0xc6, 0xe5, 0xd5, 0x3d, 0xfb, 0x41, 0x1f, 0x32, 0xc6, 0xe5, 0xd5, 0x3d, 0xfb, 0x41,
    0xa9, 0x32, 0x5a, 0xc9, 0x35, 0xdc, 0x08, 0x37, 0x33, 0x5a, 0x16, 0xe4, 0xce, 0x17, 0xc1, 0xbb,
];

const FUTURES_LIST_KEY: [u8; 16] = [
    0x00, 0x78, 0x1f, 0x0e, 0x6a, 0x37, 0x44, 0x7b, 0x50, 0x2b, 0x7c, 0x0d, 0x01, 0x40, 0x4c, 0x0a,
];

const SINGLE_CODE_LEN: usize = 9;
const LIST_CODE_LEN: usize = 23;
/// 单次行情列表请求的合约数上限，受帧长度字段限制
pub const MAX_FUTURES_PER_REQUEST: usize = (MAX_PAYLOAD_LEN - 10) / (1 + LIST_CODE_LEN);
const INSTRUMENT_RECORD_LEN: usize = 64;
const CATEGORY_RECORD_LEN: usize = 64;

/// 快照记录长度（不含代码）
const QUOTE_BODY_LEN: usize = 291;

fn datetime_from_parts(date: u32, time: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt((date / 10000) as i32, date % 10000 / 100, date % 100)?
        .and_hms_opt(time / 10000, time % 10000 / 100, time % 100)
}

fn futures_code(code: &str, len: usize) -> Result<Vec<u8>, MessageError> {
    let bytes = utf8_to_gbk(code);
    if bytes.is_empty() || bytes.len() > len {
        return Err(MessageError::InvalidCode(code.to_string()));
    }
    Ok(fixed_bytes(&bytes, len))
}

/// 扩展行情登录
pub struct ExLogin;

impl Message for ExLogin {
    type Request = ();
    type Response = ExLoginInfo;

    fn definition(_: &()) -> MessageDefinition {
        registry::EX_LOGIN
    }

    fn encode(_: &()) -> Result<Vec<u8>, MessageError> {
        Ok(LOGIN_BLOB.to_vec())
    }

    fn decode(_: &(), data: &[u8]) -> Result<ExLoginInfo, MessageError> {
        let mut reader = Reader::new(data);
        reader.skip(1 + 52)?;
        let year = reader.u16()?;
        let month = reader.u8()?;
        let day = reader.u8()?;
        let minute = reader.u8()?;
        let hour = reader.u8()?;
        let _ms = reader.u8()?;
        let second = reader.u8()?;
        let server_name = reader.text(21)?;

        let mut reserved = vec![reader.f32()? as f64, reader.u8()? as f64];
        for _ in 0..3 {
            reserved.push(reader.u16()? as f64);
        }
        let desc = reader.text(151)?;
        for _ in 0..3 {
            reserved.push(reader.u8()? as f64);
        }
        let ip = reader.text(52)?;

        let datetime = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32));

        Ok(ExLoginInfo {
            datetime,
            server_name,
            desc,
            ip,
            reserved,
        })
    }
}

/// 扩展行情服务器信息
pub struct ExServerInfoMsg;

impl Message for ExServerInfoMsg {
    type Request = ();
    type Response = ExServerInfo;

    fn definition(_: &()) -> MessageDefinition {
        registry::EX_SERVER_INFO
    }

    fn encode(_: &()) -> Result<Vec<u8>, MessageError> {
        Ok(Vec::new())
    }

    fn decode(_: &(), data: &[u8]) -> Result<ExServerInfo, MessageError> {
        let mut reader = Reader::new(data);
        let delay = reader.u32()?;
        reader.skip(12)?;
        let info = reader.text(25)?;
        let version = reader.text(29)?;

        // 70: 5 个 u16 之后是日期和时间
        reader.skip(10)?;
        let date_now = reader.u32()?;
        let time_now = reader.u32()?;

        let server_sign = Reader::at(data, 117).text(13)?;
        let name = Reader::at(data, 159).text(30)?;
        let server_sign2 = Reader::at(data, 240).text(13)?;

        Ok(ExServerInfo {
            delay,
            info,
            version,
            time_now: datetime_from_parts(date_now, time_now),
            server_sign,
            name,
            server_sign2,
        })
    }
}

/// 期货品种数量
pub struct FuturesCount;

impl Message for FuturesCount {
    type Request = ();
    /// (名称, 数量)
    type Response = (String, u32);

    fn definition(_: &()) -> MessageDefinition {
        registry::FUTURES_COUNT
    }

    fn encode(_: &()) -> Result<Vec<u8>, MessageError> {
        Ok(Vec::new())
    }

    fn decode(_: &(), data: &[u8]) -> Result<(String, u32), MessageError> {
        let mut reader = Reader::new(data);
        let name = reader.text(11)?;
        reader.skip(8)?;
        let count = reader.u32()?;
        Ok((name, count))
    }
}

/// 期货分类
pub struct FuturesCategories;

impl Message for FuturesCategories {
    type Request = ();
    type Response = Vec<FuturesCategory>;

    fn definition(_: &()) -> MessageDefinition {
        registry::FUTURES_CATEGORIES
    }

    fn encode(_: &()) -> Result<Vec<u8>, MessageError> {
        Ok(Vec::new())
    }

    fn decode(_: &(), data: &[u8]) -> Result<Vec<FuturesCategory>, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u16()? as usize;
        check_record_count(&reader, count, CATEGORY_RECORD_LEN)?;

        let mut categories = Vec::with_capacity(count);
        for _ in 0..count {
            categories.push(FuturesCategory {
                market: reader.u8()?,
                name: reader.text(32)?,
                code: reader.u8()?,
                abbr: reader.text(30)?,
            });
        }
        Ok(categories)
    }
}

/// 期货合约列表
pub struct FuturesInstruments;

#[derive(Debug, Clone)]
pub struct FuturesInstrumentsRequest {
    pub start: u32,
    pub count: u16,
}

impl Message for FuturesInstruments {
    type Request = FuturesInstrumentsRequest;
    type Response = Vec<FuturesInstrument>;

    fn definition(_: &FuturesInstrumentsRequest) -> MessageDefinition {
        registry::FUTURES_INSTRUMENTS
    }

    fn encode(req: &FuturesInstrumentsRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u32_le(req.start);
        buf.put_u16_le(req.count);
        Ok(buf.to_vec())
    }

    fn decode(
        _: &FuturesInstrumentsRequest,
        data: &[u8],
    ) -> Result<Vec<FuturesInstrument>, MessageError> {
        let mut reader = Reader::new(data);
        let _start = reader.u32()?;
        let count = reader.u16()? as usize;
        check_record_count(&reader, count, INSTRUMENT_RECORD_LEN)?;

        let mut instruments = Vec::with_capacity(count);
        for _ in 0..count {
            let market = reader.u8()?;
            let category = reader.u8()?;
            let mut reserved = vec![reader.u8()? as f64, reader.u16()? as f64];
            let code = reader.text(9)?;
            let name = reader.text(26)?;
            reserved.push(reader.f32()? as f64);
            reserved.push(reader.f32()? as f64);
            for _ in 0..8 {
                reserved.push(reader.u16()? as f64);
            }

            instruments.push(FuturesInstrument {
                market,
                category,
                code,
                name,
                reserved,
            });
        }
        Ok(instruments)
    }
}

/// 解析期货快照，记录长度为 `291 + code_len`
fn read_futures_quote(
    reader: &mut Reader<'_>,
    code_len: usize,
) -> Result<FuturesQuote, MessageError> {
    if reader.remaining() < QUOTE_BODY_LEN + code_len {
        return Err(MessageError::TruncatedValue { offset: reader.pos() });
    }

    let category = reader.u8()?;
    let code = reader.text(code_len)?;
    let active = reader.u32()?;
    let pre_close = reader.f32()?;
    let open = reader.f32()?;
    let high = reader.f32()?;
    let low = reader.f32()?;
    let price = reader.f32()?;
    let open_position = reader.u32()?;
    let add_position = reader.u32()?;
    let volume = reader.u32()?;
    let cur_volume = reader.u32()?;
    let amount = reader.f32()?;
    let inside_volume = reader.u32()?;
    let outside_volume = reader.u32()?;
    let _u14 = reader.u32()?;
    let hold_position = reader.u32()?;

    // 盘口：5 买价、5 买量、5 卖价、5 卖量
    let mut bid_prices = [0f32; 5];
    let mut ask_prices = [0f32; 5];
    let mut bids = Vec::with_capacity(5);
    let mut asks = Vec::with_capacity(5);
    for p in bid_prices.iter_mut() {
        *p = reader.f32()?;
    }
    for p in bid_prices {
        bids.push(FuturesLevel { price: p, volume: reader.u32()? });
    }
    for p in ask_prices.iter_mut() {
        *p = reader.f32()?;
    }
    for p in ask_prices {
        asks.push(FuturesLevel { price: p, volume: reader.u32()? });
    }

    reader.skip(2)?;
    let settlement = reader.f32()?;
    reader.skip(4)?;
    let average = reader.f32()?;
    let pre_settlement = reader.f32()?;
    reader.skip(16)?;
    let pre_close_price = reader.f32()?;

    reader.skip(12)?;
    let pre_volume = reader.f32()?;
    reader.skip(4 + 12 + 4)?;
    let day3_raise = reader.f32()?;
    reader.skip(25)?;
    let settlement2 = reader.f32()?;
    let date = reader.u32()?;
    reader.skip(4)?;
    let raise_speed = reader.f32()?;
    reader.skip(4 + 24 + 2 + 1)?;

    Ok(FuturesQuote {
        category,
        code,
        active,
        pre_close,
        open,
        high,
        low,
        price,
        open_position,
        add_position,
        volume,
        cur_volume,
        amount,
        inside_volume,
        outside_volume,
        hold_position,
        bids,
        asks,
        settlement,
        average,
        pre_settlement,
        pre_close_price,
        pre_volume,
        day3_raise,
        settlement2,
        date,
        raise_speed,
    })
}

fn decode_quotes_list(data: &[u8]) -> Result<Vec<FuturesQuote>, MessageError> {
    let mut reader = Reader::new(data);
    reader.skip(8)?;
    let count = reader.u16()? as usize;
    check_record_count(&reader, count, QUOTE_BODY_LEN + LIST_CODE_LEN)?;

    let mut quotes = Vec::with_capacity(count);
    for _ in 0..count {
        quotes.push(read_futures_quote(&mut reader, LIST_CODE_LEN)?);
    }
    Ok(quotes)
}

/// 单个期货行情
pub struct FuturesQuoteMsg;

#[derive(Debug, Clone)]
pub struct FuturesQuoteRequest {
    pub category: u8,
    pub code: String,
}

impl Message for FuturesQuoteMsg {
    type Request = FuturesQuoteRequest;
    type Response = FuturesQuote;

    fn definition(_: &FuturesQuoteRequest) -> MessageDefinition {
        registry::FUTURES_QUOTE
    }

    fn encode(req: &FuturesQuoteRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(1 + SINGLE_CODE_LEN);
        buf.put_u8(req.category);
        buf.put_slice(&futures_code(&req.code, SINGLE_CODE_LEN)?);
        Ok(buf.to_vec())
    }

    fn decode(_: &FuturesQuoteRequest, data: &[u8]) -> Result<FuturesQuote, MessageError> {
        read_futures_quote(&mut Reader::new(data), SINGLE_CODE_LEN)
    }
}

/// 按合约列表请求期货行情的两个操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuturesQuotesListVariant {
    /// 0x23FB
    List,
    /// 0x248A
    Quotes,
}

/// 按合约列表获取期货行情
pub struct FuturesQuotesList;

#[derive(Debug, Clone)]
pub struct FuturesQuotesListRequest {
    pub futures: Vec<(u8, String)>,
    pub variant: FuturesQuotesListVariant,
}

impl Message for FuturesQuotesList {
    type Request = FuturesQuotesListRequest;
    type Response = Vec<FuturesQuote>;

    fn definition(req: &FuturesQuotesListRequest) -> MessageDefinition {
        match req.variant {
            FuturesQuotesListVariant::List => registry::FUTURES_QUOTES_LIST,
            FuturesQuotesListVariant::Quotes => registry::FUTURES_QUOTES,
        }
    }

    fn encode(req: &FuturesQuotesListRequest) -> Result<Vec<u8>, MessageError> {
        if req.futures.is_empty() {
            return Err(MessageError::InvalidArgument("合约列表不能为空".into()));
        }
        if req.futures.len() > MAX_FUTURES_PER_REQUEST {
            return Err(MessageError::InvalidArgument(format!(
                "合约数量过多: {}",
                req.futures.len()
            )));
        }
        let count = req.futures.len() as u16;
        let tag = match req.variant {
            FuturesQuotesListVariant::List => 3148,
            FuturesQuotesListVariant::Quotes => 0,
        };

        let mut buf = BytesMut::with_capacity(10 + req.futures.len() * (1 + LIST_CODE_LEN));
        for v in [2, tag, 0, 600, count] {
            buf.put_u16_le(v);
        }
        for (category, code) in &req.futures {
            buf.put_u8(*category);
            buf.put_slice(&futures_code(code, LIST_CODE_LEN)?);
        }
        Ok(buf.to_vec())
    }

    fn decode(_: &FuturesQuotesListRequest, data: &[u8]) -> Result<Vec<FuturesQuote>, MessageError> {
        decode_quotes_list(data)
    }
}

/// 按分类分页获取期货行情
pub struct FuturesQuotesByCategory;

#[derive(Debug, Clone)]
pub struct FuturesQuotesByCategoryRequest {
    pub category: u8,
    pub start: u16,
    pub count: u16,
}

impl Message for FuturesQuotesByCategory {
    type Request = FuturesQuotesByCategoryRequest;
    type Response = Vec<FuturesQuote>;

    fn definition(_: &FuturesQuotesByCategoryRequest) -> MessageDefinition {
        registry::FUTURES_QUOTES_BY_CATEGORY
    }

    fn encode(req: &FuturesQuotesByCategoryRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u8(req.category);
        for v in [0, req.start, req.count, 1] {
            buf.put_u16_le(v);
        }
        Ok(buf.to_vec())
    }

    fn decode(
        _: &FuturesQuotesByCategoryRequest,
        data: &[u8],
    ) -> Result<Vec<FuturesQuote>, MessageError> {
        decode_quotes_list(data)
    }
}

/// 期货代码列表的两个版本，仅请求中的 mode 不同
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuturesListVariant {
    /// 0x2422, mode = 1
    Primary,
    /// 0x2423, mode = 0
    Secondary,
}

/// 期货代码列表（文本）
pub struct FuturesList;

#[derive(Debug, Clone)]
pub struct FuturesListRequest {
    pub start: u32,
    pub variant: FuturesListVariant,
}

impl Message for FuturesList {
    type Request = FuturesListRequest;
    type Response = FuturesListPage;

    fn definition(req: &FuturesListRequest) -> MessageDefinition {
        match req.variant {
            FuturesListVariant::Primary => registry::FUTURES_LIST,
            FuturesListVariant::Secondary => registry::FUTURES_LIST2,
        }
    }

    fn encode(req: &FuturesListRequest) -> Result<Vec<u8>, MessageError> {
        let mode = match req.variant {
            FuturesListVariant::Primary => 1,
            FuturesListVariant::Secondary => 0,
        };

        let mut buf = BytesMut::with_capacity(126);
        buf.put_u32_le(req.start);
        buf.put_u32_le(0);
        buf.put_slice(&FUTURES_LIST_KEY);
        buf.put_bytes(0, 85);
        buf.put_u8(mode);
        buf.put_bytes(0, 16);
        Ok(buf.to_vec())
    }

    fn decode(_: &FuturesListRequest, data: &[u8]) -> Result<FuturesListPage, MessageError> {
        let start = Reader::at(data, 35).u32()?;
        let mut reader = Reader::at(data, 161);
        let count = reader.u32()?;
        let _text_len = reader.u32()?;
        let text = reader.text(reader.remaining())?.replace('\0', "");
        Ok(FuturesListPage { start, count, text })
    }
}
