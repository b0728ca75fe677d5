use super::{registry, Message, MessageError};
use crate::protocol::codec::{check_record_count, date_to_u32, Reader};
use crate::protocol::constants::Market;
use crate::protocol::frame::MessageDefinition;
use crate::protocol::types::SecurityInfo;
use bytes::{BufMut, BytesMut};
use chrono::NaiveDate;

/// 获取证券数量
pub struct SecurityCount;

#[derive(Debug, Clone)]
pub struct SecurityCountRequest {
    pub market: Market,
    /// 交易日（北京时间）
    pub date: NaiveDate,
}

impl Message for SecurityCount {
    type Request = SecurityCountRequest;
    type Response = u16;

    fn definition(_: &SecurityCountRequest) -> MessageDefinition {
        registry::SECURITY_COUNT
    }

    fn encode(req: &SecurityCountRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u16_le(req.market.as_u16());
        buf.put_u32_le(date_to_u32(req.date));
        Ok(buf.to_vec())
    }

    fn decode(_: &SecurityCountRequest, data: &[u8]) -> Result<u16, MessageError> {
        Reader::new(data).u16()
    }
}

/// 证券列表的两种历史版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityListVariant {
    /// 0x044D，37字节记录
    Full,
    /// 0x0450，29字节记录
    Compact,
}

impl SecurityListVariant {
    pub fn record_len(self) -> usize {
        match self {
            SecurityListVariant::Full => 37,
            SecurityListVariant::Compact => 29,
        }
    }
}

/// 获取证券列表
pub struct SecurityList;

#[derive(Debug, Clone)]
pub struct SecurityListRequest {
    pub market: Market,
    pub start: u32,
    pub count: u32,
    pub variant: SecurityListVariant,
}

impl Message for SecurityList {
    type Request = SecurityListRequest;
    type Response = Vec<SecurityInfo>;

    fn definition(req: &SecurityListRequest) -> MessageDefinition {
        match req.variant {
            SecurityListVariant::Full => registry::SECURITY_LIST,
            SecurityListVariant::Compact => registry::SECURITY_LIST_B,
        }
    }

    fn encode(req: &SecurityListRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(14);
        buf.put_u16_le(req.market.as_u16());

        match req.variant {
            SecurityListVariant::Full => {
                buf.put_u32_le(req.start);
                buf.put_u32_le(req.count);
                buf.put_u32_le(0);
            }
            SecurityListVariant::Compact => {
                // 旧版本只有起始位置，服务器固定返回一页
                let start = u16::try_from(req.start).map_err(|_| {
                    MessageError::InvalidArgument(format!("起始位置超出范围: {}", req.start))
                })?;
                buf.put_u16_le(start);
            }
        }

        Ok(buf.to_vec())
    }

    fn decode(req: &SecurityListRequest, data: &[u8]) -> Result<Vec<SecurityInfo>, MessageError> {
        let mut reader = Reader::new(data);
        let count = reader.u16()? as usize;
        check_record_count(&reader, count, req.variant.record_len())?;

        let mut list = Vec::with_capacity(count);
        for _ in 0..count {
            let code = reader.text(6)?;
            let volume_unit = reader.u16()?;
            let name = reader.text(8)?;

            let mut reserved = match req.variant {
                SecurityListVariant::Full => reader.take(12)?.to_vec(),
                SecurityListVariant::Compact => reader.take(4)?.to_vec(),
            };
            let decimal_point = reader.u8()?;
            let pre_close = reader.f32()?;
            reserved.extend_from_slice(reader.take(4)?);

            list.push(SecurityInfo {
                code,
                volume_unit,
                name,
                decimal_point,
                pre_close,
                reserved,
            });
        }

        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::utf8_to_gbk;
    use crate::protocol::codec::fixed_bytes;

    fn record(code: &str, name: &str, variant: SecurityListVariant) -> Vec<u8> {
        let mut rec = code.as_bytes().to_vec();
        rec.extend(100u16.to_le_bytes());
        rec.extend(fixed_bytes(&utf8_to_gbk(name), 8));
        let gap = match variant {
            SecurityListVariant::Full => 12,
            SecurityListVariant::Compact => 4,
        };
        rec.extend(vec![0xAA; gap]);
        rec.push(2);
        rec.extend(10.5f32.to_le_bytes());
        rec.extend([1, 2, 3, 4]);
        assert_eq!(rec.len(), variant.record_len());
        rec
    }

    fn request(variant: SecurityListVariant) -> SecurityListRequest {
        SecurityListRequest {
            market: Market::SZ,
            start: 0,
            count: 1600,
            variant,
        }
    }

    #[test]
    fn count_request_layout() {
        let req = SecurityCountRequest {
            market: Market::SH,
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        };
        let body = SecurityCount::encode(&req).unwrap();
        assert_eq!(body[..2], [0x01, 0x00]);
        assert_eq!(u32::from_le_bytes([body[2], body[3], body[4], body[5]]), 20240315);
        assert_eq!(SecurityCount::decode(&req, &[0x2C, 0x01]).unwrap(), 300);
    }

    #[test]
    fn list_request_layouts() {
        let full = SecurityList::encode(&request(SecurityListVariant::Full)).unwrap();
        assert_eq!(full.len(), 14);
        assert_eq!(full[6..10], 1600u32.to_le_bytes());

        let compact = SecurityList::encode(&request(SecurityListVariant::Compact)).unwrap();
        assert_eq!(compact, vec![0, 0, 0, 0]);

        let mut big = request(SecurityListVariant::Compact);
        big.start = 70_000;
        assert!(matches!(
            SecurityList::encode(&big),
            Err(MessageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn decode_both_variants() {
        for variant in [SecurityListVariant::Full, SecurityListVariant::Compact] {
            let mut data = 2u16.to_le_bytes().to_vec();
            data.extend(record("000001", "平安银行", variant));
            data.extend(record("000002", "万科Ａ", variant));

            let list = SecurityList::decode(&request(variant), &data).unwrap();
            assert_eq!(list.len(), 2);
            assert_eq!(list[0].code, "000001");
            assert_eq!(list[0].name, "平安银行");
            assert_eq!(list[1].code, "000002");
            assert_eq!(list[1].volume_unit, 100);
            assert_eq!(list[1].decimal_point, 2);
            assert_eq!(list[1].pre_close, 10.5);
            assert_eq!(list[1].reserved.len(), variant.record_len() - 21);
        }
    }

    #[test]
    fn rejects_overstated_count() {
        let variant = SecurityListVariant::Full;
        let mut data = 3u16.to_le_bytes().to_vec();
        data.extend(record("600000", "浦发银行", variant));
        data.extend(record("600004", "白云机场", variant));

        assert!(matches!(
            SecurityList::decode(&request(variant), &data),
            Err(MessageError::UnexpectedRecordCount { declared: 3, available: 2 })
        ));
    }
}
