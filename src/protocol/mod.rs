pub mod constants;
pub mod frame;
pub mod types;
pub mod codec;
pub mod messages;

pub use constants::{BlockFileType, Category, Market, Period, PREFIX_RESP};
pub use frame::{FrameError, MessageDefinition, RequestFrame, ResponseFrame, ResponseHeader};
pub use types::{
    BoardEntry, ChartPoint, ChartSampling, ExLoginInfo, ExServerInfo, FileChunk, FileMeta,
    FuturesCategory, FuturesInstrument, FuturesLevel, FuturesListPage, FuturesQuote,
    HistoryOrders, IndexInfo, IndexMinute, KlineBar, OrderLevel, Price, PriceLevel,
    QuoteListExtra, QuoteSnapshot, SecurityInfo, TopBoard, TradeAction, Transaction,
    UnusualEvent,
};
pub use codec::*;
pub use messages::*;
