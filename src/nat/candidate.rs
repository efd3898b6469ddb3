//! ICE 候选行解析
//!
//! 支持两种文本形式:
//! - SDP 属性行: `a=candidate:1 1 udp 2113937151 10.0.0.1 54321 typ srflx ...`
//! - 事件中的候选串: `candidate:1 1 udp 2113937151 10.0.0.1 54321 typ srflx ...`
//!
//! 前 8 个字段位置固定，之后是可选的 `key value` 扩展对。

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// SDP 属性行前缀
const SDP_ATTRIBUTE_PREFIX: &str = "a=candidate:";

/// 候选串前缀
const CANDIDATE_PREFIX: &str = "candidate:";

/// 固定字段数量 (foundation ... type)
const MANDATORY_FIELDS: usize = 8;

/// 服务器反射候选类型
pub const SERVER_REFLEXIVE: &str = "srflx";

/// 候选解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("Candidate line has no candidate prefix")]
    MissingPrefix,

    #[error("Candidate line is missing field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid number for `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// 解析后的 ICE 候选
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidateRecord {
    pub foundation: String,
    pub component: u16,
    /// 传输协议 (小写)
    pub protocol: String,
    pub priority: u32,
    pub ip: String,
    pub port: u16,
    /// 候选类型: host, srflx, prflx, relay
    pub kind: String,
    pub related_address: Option<String>,
    /// STUN 服务器转换前观察到的本地端口
    pub related_port: Option<u16>,
    pub tcp_type: Option<String>,
}

impl IceCandidateRecord {
    /// 解析候选行
    pub fn parse(line: &str) -> Result<Self, CandidateError> {
        let line = line.trim();
        let body = line
            .strip_prefix(SDP_ATTRIBUTE_PREFIX)
            .or_else(|| line.strip_prefix(CANDIDATE_PREFIX))
            .ok_or(CandidateError::MissingPrefix)?;

        let parts: Vec<&str> = body.split_whitespace().collect();
        let field = |index: usize, name: &'static str| {
            parts
                .get(index)
                .copied()
                .ok_or(CandidateError::MissingField(name))
        };

        let mut record = IceCandidateRecord {
            foundation: field(0, "foundation")?.to_string(),
            component: parse_number(field(1, "component")?, "component")?,
            protocol: field(2, "protocol")?.to_lowercase(),
            priority: parse_number(field(3, "priority")?, "priority")?,
            ip: field(4, "ip")?.to_string(),
            port: parse_number(field(5, "port")?, "port")?,
            // parts[6] == "typ"
            kind: field(7, "type")?.to_string(),
            related_address: None,
            related_port: None,
            tcp_type: None,
        };

        for pair in parts[MANDATORY_FIELDS..].chunks(2) {
            let [key, value] = pair else {
                break;
            };
            match *key {
                "raddr" => record.related_address = Some(value.to_string()),
                // 非数字的 rport 不影响整行，只是没有相关端口
                "rport" => {
                    record.related_port = value.parse().ok();
                    if record.related_port.is_none() {
                        tracing::debug!("无法解析的 rport: {}", value);
                    }
                }
                "tcptype" => record.tcp_type = Some(value.to_string()),
                // 未知扩展直接忽略
                _ => {}
            }
        }

        Ok(record)
    }

    /// 是否为 STUN 服务器分配的服务器反射候选
    pub fn is_server_reflexive(&self) -> bool {
        self.kind == SERVER_REFLEXIVE
    }
}

impl FromStr for IceCandidateRecord {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IceCandidateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {} {} {} {} {} typ {}",
            CANDIDATE_PREFIX,
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.ip,
            self.port,
            self.kind
        )?;
        if let Some(addr) = &self.related_address {
            write!(f, " raddr {}", addr)?;
        }
        if let Some(port) = self.related_port {
            write!(f, " rport {}", port)?;
        }
        if let Some(tcp_type) = &self.tcp_type {
            write!(f, " tcptype {}", tcp_type)?;
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(value: &str, field: &'static str) -> Result<T, CandidateError> {
    value.parse().map_err(|_| CandidateError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sdp_attribute_line() {
        let c = IceCandidateRecord::parse(
            "a=candidate:1 1 udp 2113937151 10.0.0.1 54321 typ srflx raddr 1.2.3.4 rport 9999",
        )
        .unwrap();

        assert_eq!(c.foundation, "1");
        assert_eq!(c.component, 1);
        assert_eq!(c.protocol, "udp");
        assert_eq!(c.priority, 2113937151);
        assert_eq!(c.ip, "10.0.0.1");
        assert_eq!(c.port, 54321);
        assert_eq!(c.kind, "srflx");
        assert_eq!(c.related_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(c.related_port, Some(9999));
        assert_eq!(c.tcp_type, None);
        assert!(c.is_server_reflexive());
    }

    #[test]
    fn test_parse_event_variant_and_lowercases_protocol() {
        let c: IceCandidateRecord = "candidate:842163049 1 UDP 1677729535 203.0.113.7 61000 typ srflx raddr 192.168.1.20 rport 50000 generation 0"
            .parse()
            .unwrap();

        assert_eq!(c.protocol, "udp");
        assert_eq!(c.port, 61000);
        assert_eq!(c.related_port, Some(50000));
    }

    #[test]
    fn test_parse_tcp_host_candidate() {
        let c = IceCandidateRecord::parse(
            "candidate:2 1 tcp 1518280447 192.168.1.20 9 typ host tcptype active",
        )
        .unwrap();

        assert_eq!(c.kind, "host");
        assert_eq!(c.tcp_type.as_deref(), Some("active"));
        assert!(!c.is_server_reflexive());
        assert_eq!(c.related_port, None);
    }

    #[test]
    fn test_unknown_extensions_ignored() {
        let c = IceCandidateRecord::parse(
            "candidate:1 1 udp 100 10.0.0.1 5000 typ srflx network-id 3 ufrag abcd rport 4000",
        )
        .unwrap();
        assert_eq!(c.related_port, Some(4000));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            IceCandidateRecord::parse("1 1 udp 100 10.0.0.1 5000 typ host"),
            Err(CandidateError::MissingPrefix)
        );
        assert_eq!(
            IceCandidateRecord::parse("candidate:1 1 udp 100 10.0.0.1"),
            Err(CandidateError::MissingField("port"))
        );
        assert!(matches!(
            IceCandidateRecord::parse("candidate:1 1 udp 100 10.0.0.1 port typ srflx"),
            Err(CandidateError::InvalidNumber { field: "port", .. })
        ));
    }

    #[test]
    fn test_invalid_rport_keeps_candidate() {
        let c = IceCandidateRecord::parse(
            "candidate:1 1 udp 100 10.0.0.1 5000 typ srflx raddr 1.2.3.4 rport x",
        )
        .unwrap();
        assert!(c.is_server_reflexive());
        assert_eq!(c.port, 5000);
        assert_eq!(c.related_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(c.related_port, None);
    }

    #[test]
    fn test_display_reparses() {
        let line = "candidate:1 1 udp 2113937151 10.0.0.1 54321 typ srflx raddr 1.2.3.4 rport 9999";
        let c = IceCandidateRecord::parse(line).unwrap();
        assert_eq!(c.to_string(), line);
    }
}
