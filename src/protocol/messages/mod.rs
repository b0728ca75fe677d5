//! 各种消息类型的编解码实现
//!
//! 每个接口是一个实现 [`Message`] 的零大小类型：请求参数编码为帧体 payload，
//! 响应 payload（已去掉帧头并解压）解码为领域类型。接口的操作码、标志等
//! 描述集中在 [`registry`] 中以常量形式给出。

mod file;
mod futures;
mod index;
mod kline;
mod quotes;
mod security;
mod session;
mod transaction;
mod unusual;

pub use file::{FileDownload, FileDownloadRequest, FileMetaMsg};
pub use futures::{
    ExLogin, ExServerInfoMsg, FuturesCategories, FuturesCount, FuturesInstruments,
    FuturesInstrumentsRequest, FuturesList, FuturesListRequest, FuturesListVariant,
    FuturesQuoteMsg, FuturesQuoteRequest, FuturesQuotesByCategory, FuturesQuotesByCategoryRequest,
    FuturesQuotesList, FuturesQuotesListRequest, FuturesQuotesListVariant,
};
pub use index::{
    ChartSamplingMsg, IndexChart, IndexChartRequest, IndexInfoMsg, SecurityRequest,
};
pub use kline::{decode_bars, Kline, KlineRequest, KlineVariant};
pub use quotes::{
    Quotes, QuotesDetail, QuotesList, QuotesListRequest, TopBoardMsg, TopBoardRequest,
};
pub use security::{
    SecurityCount, SecurityCountRequest, SecurityList, SecurityListRequest, SecurityListVariant,
};
pub use session::{Connect, Heartbeat};
pub use transaction::{
    HistoryOrdersMsg, HistoryOrdersRequest, HistoryTransaction, HistoryTransactionRequest,
    TransactionMsg, TransactionRequest,
};
pub use unusual::{describe_event, Unusual, UnusualRequest};

use crate::protocol::constants::Market;
use crate::protocol::frame::MessageDefinition;
use thiserror::Error;

/// 消息编解码错误
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("数据长度不足: 偏移 {offset}")]
    TruncatedValue { offset: usize },
    #[error("记录数量不符: 声明 {declared} 条, 剩余数据只够 {available} 条")]
    UnexpectedRecordCount { declared: usize, available: usize },
    #[error("无效的股票代码: {0}")]
    InvalidCode(String),
    #[error("无效的市场: {0}")]
    InvalidMarket(u16),
    #[error("无效的日期: {0}")]
    InvalidDate(u32),
    #[error("参数错误: {0}")]
    InvalidArgument(String),
    #[error("数值溢出: 偏移 {offset}")]
    ValueOverflow { offset: usize },
}

/// 一个协议接口：请求编码 + 响应解码
///
/// 解码时可以访问请求参数（例如K线的周期决定时间字段格式）。
pub trait Message {
    type Request;
    type Response;

    /// 该请求使用的接口描述（同一族的变体可能选择不同操作码）
    fn definition(req: &Self::Request) -> MessageDefinition;

    fn encode(req: &Self::Request) -> Result<Vec<u8>, MessageError>;

    fn decode(req: &Self::Request, data: &[u8]) -> Result<Self::Response, MessageError>;
}

/// 所有接口描述
pub mod registry {
    use crate::protocol::constants::opcode;
    use crate::protocol::frame::MessageDefinition;

    /// 扩展行情服务器使用的 customize 值
    pub const EX_CUSTOMIZE: u32 = 1;

    const fn quote(name: &'static str, opcode: u16) -> MessageDefinition {
        MessageDefinition::new(name, opcode)
    }

    const fn ex(name: &'static str, opcode: u16) -> MessageDefinition {
        MessageDefinition::new(name, opcode).with_customize(EX_CUSTOMIZE)
    }

    pub const CONNECT: MessageDefinition = quote("connect", opcode::CONNECT);
    pub const HEARTBEAT: MessageDefinition = quote("heartbeat", opcode::HEARTBEAT);
    pub const SECURITY_COUNT: MessageDefinition = quote("security_count", opcode::SECURITY_COUNT);
    pub const SECURITY_LIST: MessageDefinition = quote("security_list", opcode::SECURITY_LIST);
    pub const SECURITY_LIST_B: MessageDefinition = quote("security_list_b", opcode::SECURITY_LIST_B);
    pub const INDEX_INFO: MessageDefinition = quote("index_info", opcode::INDEX_INFO);
    pub const KLINE: MessageDefinition = quote("kline", opcode::KLINE);
    pub const KLINE_OFFSET: MessageDefinition = quote("kline_offset", opcode::KLINE_OFFSET);
    pub const INDEX_CHART: MessageDefinition = quote("index_chart", opcode::INDEX_CHART);
    pub const QUOTES_DETAIL: MessageDefinition = quote("quotes_detail", opcode::QUOTES_DETAIL);
    pub const TOP_BOARD: MessageDefinition = quote("top_board", opcode::TOP_BOARD);
    pub const QUOTES_LIST: MessageDefinition = quote("quotes_list", opcode::QUOTES_LIST);
    pub const QUOTES: MessageDefinition = quote("quotes", opcode::QUOTES);
    pub const UNUSUAL: MessageDefinition = quote("unusual", opcode::UNUSUAL);
    pub const HISTORY_ORDERS: MessageDefinition = quote("history_orders", opcode::HISTORY_ORDERS);
    pub const HISTORY_TRANSACTION: MessageDefinition =
        quote("history_transaction", opcode::HISTORY_TRANSACTION);
    pub const TRANSACTION: MessageDefinition = quote("transaction", opcode::TRANSACTION);
    pub const CHART_SAMPLING: MessageDefinition = quote("chart_sampling", opcode::CHART_SAMPLING);
    pub const FILE_META: MessageDefinition = quote("file_meta", opcode::FILE_META);
    pub const FILE_DOWNLOAD: MessageDefinition = quote("file_download", opcode::FILE_DOWNLOAD);

    pub const EX_LOGIN: MessageDefinition = ex("ex_login", opcode::EX_LOGIN);
    pub const EX_SERVER_INFO: MessageDefinition = ex("ex_server_info", opcode::EX_SERVER_INFO);
    pub const FUTURES_COUNT: MessageDefinition = ex("futures_count", opcode::FUTURES_COUNT);
    pub const FUTURES_CATEGORIES: MessageDefinition =
        ex("futures_categories", opcode::FUTURES_CATEGORIES);
    pub const FUTURES_INSTRUMENTS: MessageDefinition =
        ex("futures_instruments", opcode::FUTURES_INSTRUMENTS);
    pub const FUTURES_QUOTE: MessageDefinition = ex("futures_quote", opcode::FUTURES_QUOTE);
    pub const FUTURES_QUOTES_LIST: MessageDefinition =
        ex("futures_quotes_list", opcode::FUTURES_QUOTES_LIST);
    pub const FUTURES_LIST: MessageDefinition = ex("futures_list", opcode::FUTURES_LIST);
    pub const FUTURES_LIST2: MessageDefinition = ex("futures_list2", opcode::FUTURES_LIST2);
    pub const FUTURES_QUOTES_BY_CATEGORY: MessageDefinition =
        ex("futures_quotes_by_category", opcode::FUTURES_QUOTES_BY_CATEGORY);
    pub const FUTURES_QUOTES: MessageDefinition = ex("futures_quotes", opcode::FUTURES_QUOTES);

    pub const ALL: [MessageDefinition; 31] = [
        CONNECT,
        HEARTBEAT,
        SECURITY_COUNT,
        SECURITY_LIST,
        SECURITY_LIST_B,
        INDEX_INFO,
        KLINE,
        KLINE_OFFSET,
        INDEX_CHART,
        QUOTES_DETAIL,
        TOP_BOARD,
        QUOTES_LIST,
        QUOTES,
        UNUSUAL,
        HISTORY_ORDERS,
        HISTORY_TRANSACTION,
        TRANSACTION,
        CHART_SAMPLING,
        FILE_META,
        FILE_DOWNLOAD,
        EX_LOGIN,
        EX_SERVER_INFO,
        FUTURES_COUNT,
        FUTURES_CATEGORIES,
        FUTURES_INSTRUMENTS,
        FUTURES_QUOTE,
        FUTURES_QUOTES_LIST,
        FUTURES_LIST,
        FUTURES_LIST2,
        FUTURES_QUOTES_BY_CATEGORY,
        FUTURES_QUOTES,
    ];

    /// 按操作码查找接口描述
    pub fn lookup(opcode: u16) -> Option<&'static MessageDefinition> {
        ALL.iter().find(|def| def.opcode == opcode)
    }
}

/// 编码6位证券代码
pub(crate) fn security_code(code: &str) -> Result<[u8; 6], MessageError> {
    let bytes = code.as_bytes();
    if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_alphanumeric) {
        return Err(MessageError::InvalidCode(code.to_string()));
    }
    let mut out = [0u8; 6];
    out.copy_from_slice(bytes);
    Ok(out)
}

pub(crate) fn market_from(raw: u16) -> Result<Market, MessageError> {
    u8::try_from(raw)
        .ok()
        .and_then(Market::from_u8)
        .ok_or(MessageError::InvalidMarket(raw))
}

/// 解析带市场前缀的代码，如 `sh600000`
pub fn parse_symbol(symbol: &str) -> Result<(Market, String), MessageError> {
    let symbol = symbol.to_lowercase();
    if symbol.len() != 8 || !symbol.is_ascii() {
        return Err(MessageError::InvalidCode(symbol));
    }

    let market = match &symbol[..2] {
        "sh" => Market::SH,
        "sz" => Market::SZ,
        "bj" => Market::BJ,
        _ => return Err(MessageError::InvalidCode(symbol)),
    };

    let code = symbol[2..].to_string();
    security_code(&code)?;
    Ok((market, code))
}
