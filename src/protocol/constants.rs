//! 协议常量定义

use serde::{Deserialize, Serialize};

/// 请求帧默认标志（未压缩）
pub const FLAG_PLAIN: u8 = 0x0C;

/// 请求帧压缩标志
pub const FLAG_ZIP: u8 = 0x1C;

/// 帧版本号，固定为 1
pub const FRAME_VERSION: u8 = 0x01;

/// 响应帧固定前缀（大端序读取：B1CB7400）
pub const PREFIX_RESP: u32 = 0xB1CB7400;

/// 行情主站默认端口
pub const DEFAULT_PORT: u16 = 7709;

/// 扩展行情默认端口
pub const EX_DEFAULT_PORT: u16 = 7727;

/// 各接口单页上限
pub const MAX_LIST_COUNT: u32 = 1600;
pub const MAX_KLINE_COUNT: u32 = 800;
pub const MAX_QUOTE_COUNT: u32 = 80;
pub const MAX_UNUSUAL_COUNT: u32 = 600;
pub const MAX_TRANSACTION_COUNT: u32 = 1800;
pub const MAX_HISTORY_TRANSACTION_COUNT: u32 = 2000;

/// 文件下载单块大小
pub const FILE_CHUNK_SIZE: u32 = 0x7530;

/// 操作码（帧体中的 msg_id）
pub mod opcode {
    pub const HEARTBEAT: u16 = 0x0004;
    pub const CONNECT: u16 = 0x000D;
    pub const FILE_META: u16 = 0x02C5;
    pub const SECURITY_LIST: u16 = 0x044D;
    pub const SECURITY_COUNT: u16 = 0x044E;
    pub const SECURITY_LIST_B: u16 = 0x0450;
    pub const INDEX_INFO: u16 = 0x051D;
    pub const KLINE: u16 = 0x0523;
    pub const KLINE_OFFSET: u16 = 0x052D;
    pub const INDEX_CHART: u16 = 0x0537;
    pub const QUOTES_DETAIL: u16 = 0x053E;
    pub const TOP_BOARD: u16 = 0x053F;
    pub const QUOTES_LIST: u16 = 0x054B;
    pub const QUOTES: u16 = 0x054C;
    pub const UNUSUAL: u16 = 0x0563;
    pub const FILE_DOWNLOAD: u16 = 0x06B9;
    pub const HISTORY_ORDERS: u16 = 0x0FB4;
    pub const HISTORY_TRANSACTION: u16 = 0x0FB5;
    pub const TRANSACTION: u16 = 0x0FC5;
    pub const CHART_SAMPLING: u16 = 0x0FD1;

    // 扩展行情（期货等）
    pub const FUTURES_COUNT: u16 = 0x23F0;
    pub const FUTURES_CATEGORIES: u16 = 0x23F4;
    pub const FUTURES_INSTRUMENTS: u16 = 0x23F5;
    pub const FUTURES_QUOTE: u16 = 0x23FA;
    pub const FUTURES_QUOTES_LIST: u16 = 0x23FB;
    pub const FUTURES_LIST: u16 = 0x2422;
    pub const FUTURES_LIST2: u16 = 0x2423;
    pub const EX_LOGIN: u16 = 0x2454;
    pub const EX_SERVER_INFO: u16 = 0x2455;
    pub const FUTURES_QUOTES_BY_CATEGORY: u16 = 0x2484;
    pub const FUTURES_QUOTES: u16 = 0x248A;
}

/// 市场
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    SZ = 0, // 深圳
    SH = 1, // 上海
    BJ = 2, // 北京
}

impl Market {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Market::SZ),
            1 => Some(Market::SH),
            2 => Some(Market::BJ),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Market::SZ => "sz",
            Market::SH => "sh",
            Market::BJ => "bj",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Market::SH => "上海",
            Market::SZ => "深圳",
            Market::BJ => "北京",
        }
    }
}

/// K线周期
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Min5 = 0,     // 5分钟
    Min15 = 1,    // 15分钟
    Min30 = 2,    // 30分钟
    Hour = 3,     // 60分钟
    Day2 = 4,     // 日线（变体）
    Week = 5,     // 周线
    Month = 6,    // 月线
    Min1 = 7,     // 1分钟
    Min1B = 8,    // 1分钟（变体）
    Day = 9,      // 日线
    Quarter = 10, // 季线
    Year = 11,    // 年线
}

impl Period {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// 时间字段是否为“压缩日期 + 分钟数”格式
    pub fn is_minute_category(self) -> bool {
        matches!(
            self,
            Period::Min5 | Period::Min15 | Period::Min30 | Period::Hour | Period::Min1 | Period::Min1B
        )
    }
}

/// 板块分类（行情列表、排行榜使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category(pub u16);

impl Category {
    pub const SH: Category = Category(0);   // 上证A股
    pub const SHB: Category = Category(1);  // 上证B股
    pub const SZ: Category = Category(2);   // 深证A股
    pub const SZB: Category = Category(3);  // 深证B股
    pub const A: Category = Category(6);    // 沪深A股
    pub const B: Category = Category(7);    // 沪深B股
    pub const KCB: Category = Category(8);  // 科创板
    pub const BJ: Category = Category(12);  // 北证A股
    pub const CYB: Category = Category(14); // 创业板

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// 板块文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockFileType {
    Default, // 一般板块
    Index,   // 指数板块
    Style,   // 风格板块
    Concept, // 概念板块
}

impl BlockFileType {
    pub fn file_name(self) -> &'static str {
        match self {
            BlockFileType::Default => "block.dat",
            BlockFileType::Index => "block_zs.dat",
            BlockFileType::Style => "block_fg.dat",
            BlockFileType::Concept => "block_gn.dat",
        }
    }
}
