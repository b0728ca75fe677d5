//! 数据编码/解码工具函数

use crate::protocol::messages::MessageError;
use crate::protocol::types::Price;
use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::GBK;

/// 将 GBK 编码的字节数组转换为 UTF-8 字符串
///
/// 无法解码的字节以替换字符代替，不会中断整个响应的解析。
pub fn gbk_to_utf8(bytes: &[u8]) -> String {
    let (cow, _, _) = GBK.decode(bytes);
    cow.trim_end_matches('\0').to_string()
}

/// 将 UTF-8 字符串转换为 GBK 编码的字节数组
pub fn utf8_to_gbk(s: &str) -> Vec<u8> {
    let (cow, _, _) = GBK.encode(s);
    cow.to_vec()
}

/// 编码为定长字段：不足补 0，超出截断
pub fn fixed_bytes(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let n = bytes.len().min(len);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// 解析变长整数编码（价格/差值）
///
/// 第一字节：
/// - 第7位（最高位）：0x80，表示是否有后续字节（1=有，0=无）
/// - 第6位：0x40，表示符号（1=负，0=正）
/// - 低6位：有效数据位
///
/// 后续字节：
/// - 第7位：0x80，表示是否有后续字节
/// - 低7位：有效数据位
///
/// 返回 (数值, 新的位置)。缓冲区在终止字节之前耗尽时返回 `TruncatedValue`。
pub fn decode_varint(data: &[u8], pos: usize) -> Result<(i64, usize), MessageError> {
    let first = *data
        .get(pos)
        .ok_or(MessageError::TruncatedValue { offset: pos })?;

    let mut value = (first & 0x3F) as i64;
    let mut cursor = pos + 1;
    let mut shift = 6u32;
    let mut byte = first;

    while byte & 0x80 != 0 {
        byte = *data
            .get(cursor)
            .ok_or(MessageError::TruncatedValue { offset: pos })?;
        if shift < 57 {
            value += ((byte & 0x7F) as i64) << shift;
        }
        shift += 7;
        cursor += 1;
    }

    if first & 0x40 != 0 {
        value = -value;
    }

    Ok((value, cursor))
}

/// 编码变长整数
pub fn encode_varint(value: i64) -> Vec<u8> {
    let mut result = Vec::new();
    let mut val = value.unsigned_abs();

    // 第一字节
    let mut first_byte = (val & 0x3F) as u8;
    val >>= 6;

    if value < 0 {
        first_byte |= 0x40;
    }
    if val > 0 {
        first_byte |= 0x80;
    }
    result.push(first_byte);

    // 后续字节
    while val > 0 {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        result.push(byte);
    }

    result
}

/// 解码K线时间
///
/// 分钟级：低2字节为压缩日期（年 = 高5位 + 2004，月日 = 余数的百位/个位），高2字节为分钟数；
/// 日线及以上：YYYYMMDD，时间取收盘 15:00。
/// 日期不合法时返回 `None`。
pub fn decode_kline_datetime(raw: u32, minute_category: bool) -> Option<NaiveDateTime> {
    if minute_category {
        let zipday = raw & 0xFFFF;
        let minutes = raw >> 16;
        let year = ((zipday >> 11) + 2004) as i32;
        let month = (zipday % 2048) / 100;
        let day = (zipday % 2048) % 100;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(minutes / 60, minutes % 60, 0)
    } else {
        let year = (raw / 10000) as i32;
        let month = (raw % 10000) / 100;
        let day = raw % 100;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(15, 0, 0)
    }
}

/// 格式化服务器时间字段（HHMMSSsss 风格的混合进制数）
pub fn format_server_time(raw: i64) -> String {
    let v = raw.max(0);
    let hour = v / 1_000_000;
    let rest = v % 1_000_000;
    let minute = rest / 10_000;

    if minute < 60 {
        let seconds = (rest % 10_000) as f64 * 60.0 / 10_000.0;
        format!("{}:{:02}:{:06.3}", hour, minute, seconds)
    } else {
        let scaled = rest * 60;
        let minute = scaled / 1_000_000;
        let seconds = (scaled % 1_000_000) as f64 * 60.0 / 1_000_000.0;
        format!("{}:{:02}:{:06.3}", hour, minute, seconds)
    }
}

/// 日期转为 YYYYMMDD 整数
pub fn date_to_u32(date: NaiveDate) -> u32 {
    use chrono::Datelike;
    date.year() as u32 * 10000 + date.month() * 100 + date.day()
}

/// 响应数据的顺序读取游标
///
/// 所有读取在越界时返回 `TruncatedValue`，不会静默补零。
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], MessageError> {
        if self.remaining() < n {
            return Err(MessageError::TruncatedValue { offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), MessageError> {
        self.take(n).map(|_| ())
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], MessageError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, MessageError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, MessageError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, MessageError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, MessageError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// 读取 GBK 定长文本
    pub fn text(&mut self, n: usize) -> Result<String, MessageError> {
        Ok(gbk_to_utf8(self.take(n)?))
    }

    /// 读取变长整数
    pub fn varint(&mut self) -> Result<i64, MessageError> {
        let (value, pos) = decode_varint(self.data, self.pos)?;
        self.pos = pos;
        Ok(value)
    }

    /// 读取以分为单位的价格差值，换算为厘后与 `base` 相加
    pub fn fen_delta(&mut self, base: Price) -> Result<Price, MessageError> {
        let offset = self.pos;
        let delta = self.varint()?;
        Price::from_fen(delta)
            .and_then(|delta| base.checked_add(delta))
            .ok_or(MessageError::ValueOverflow { offset })
    }

    pub fn fen(&mut self) -> Result<Price, MessageError> {
        self.fen_delta(Price(0))
    }

    /// 读取以厘为单位的价格差值并与 `base` 相加
    pub fn li_delta(&mut self, base: Price) -> Result<Price, MessageError> {
        let offset = self.pos;
        let delta = self.varint()?;
        base.checked_add(Price(delta))
            .ok_or(MessageError::ValueOverflow { offset })
    }

    /// 读取分钟数时间（2字节）
    pub fn hour_minute(&mut self) -> Result<(u16, u16), MessageError> {
        let minutes = self.u16()?;
        Ok((minutes / 60, minutes % 60))
    }

    /// 不移动游标读取 u32
    pub fn peek_u32(&self) -> Option<u32> {
        let bytes = self.data.get(self.pos..self.pos + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// 校验定长记录数量与剩余数据长度是否一致
pub fn check_record_count(
    reader: &Reader<'_>,
    count: usize,
    record_len: usize,
) -> Result<(), MessageError> {
    let available = reader.remaining() / record_len;
    if count > available {
        return Err(MessageError::UnexpectedRecordCount {
            declared: count,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_single_byte() {
        assert_eq!(decode_varint(&[0x05], 0).unwrap(), (5, 1));
        assert_eq!(decode_varint(&[0x45], 0).unwrap(), (-5, 1));
        assert_eq!(decode_varint(&[0x00], 0).unwrap(), (0, 1));
    }

    #[test]
    fn varint_multi_byte() {
        // 0x80 | 0x3F, 0x01 => 63 + (1 << 6) = 127
        assert_eq!(decode_varint(&[0xBF, 0x01], 0).unwrap(), (127, 2));
        // 负数多字节
        assert_eq!(decode_varint(&[0xC1, 0x02], 0).unwrap(), (-(1 + (2 << 6)), 2));
    }

    #[test]
    fn varint_truncated() {
        assert!(matches!(
            decode_varint(&[0x81], 0),
            Err(MessageError::TruncatedValue { offset: 0 })
        ));
        assert!(matches!(
            decode_varint(&[], 0),
            Err(MessageError::TruncatedValue { .. })
        ));
    }

    #[test]
    fn varint_concatenated_stream_consumes_exactly() {
        let values = [0i64, 1, -1, 63, 64, -64, 8191, -8192, 1_000_000, -123_456_789, 42];
        let mut buf = Vec::new();
        for v in values {
            buf.extend(encode_varint(v));
        }

        let mut reader = Reader::new(&buf);
        let mut decoded = Vec::new();
        while !reader.is_empty() {
            decoded.push(reader.varint().unwrap());
        }
        assert_eq!(decoded, values);
        assert_eq!(reader.pos(), buf.len());
    }

    #[test]
    fn varint_mixed_widths() {
        let data = hex_bytes("1f812b7bbc50b941");
        let mut reader = Reader::new(&data);
        let values: Vec<i64> = (0..5).map(|_| reader.varint().unwrap()).collect();
        assert_eq!(values, vec![31, 2753, -59, 5180, 4217]);
        assert_eq!(reader.pos(), data.len());
    }

    #[test]
    fn accumulated_li_overflow_is_error() {
        let mut buf = Vec::new();
        for _ in 0..3 {
            buf.extend(encode_varint((1i64 << 62) - 1));
        }

        let mut reader = Reader::new(&buf);
        let first = reader.li_delta(Price(0)).unwrap();
        let second = reader.li_delta(first).unwrap();
        let third_at = reader.pos();
        assert!(matches!(
            reader.li_delta(second),
            Err(MessageError::ValueOverflow { offset }) if offset == third_at
        ));
    }

    fn hex_bytes(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn kline_datetime_day() {
        let dt = decode_kline_datetime(20240315, false).unwrap();
        assert_eq!(dt.to_string(), "2024-03-15 15:00:00");
        assert!(decode_kline_datetime(20241315, false).is_none());
    }

    #[test]
    fn kline_datetime_minute() {
        // 2024 -> (2024-2004) << 11 = 40960; 0315 => 315
        let zipday = (20u32 << 11) + 315;
        let raw = (570u32 << 16) | zipday; // 09:30
        let dt = decode_kline_datetime(raw, true).unwrap();
        assert_eq!(dt.to_string(), "2024-03-15 09:30:00");
    }

    #[test]
    fn server_time_format() {
        assert_eq!(format_server_time(14_305_000), "14:30:30.000");
        assert_eq!(format_server_time(9_250_000), "9:25:00.000");
    }

    #[test]
    fn reader_rejects_overrun() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(reader.u16().unwrap(), 0x0201);
        assert!(matches!(
            reader.u16(),
            Err(MessageError::TruncatedValue { offset: 2 })
        ));
    }

    #[test]
    fn gbk_text_trims_nul() {
        let mut bytes = utf8_to_gbk("平安银行");
        bytes.extend([0, 0]);
        assert_eq!(gbk_to_utf8(&bytes), "平安银行");
    }
}
