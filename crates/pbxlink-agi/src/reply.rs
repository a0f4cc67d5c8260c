//! Decoding of single-line (or continuation-extended) AGI replies.
//!
//! Wire shape: `<3-digit code> result=<int> [(<data>)]`, e.g. `200 result=49 (abcd)`.

/// Status code of a successful reply.
pub const SUCCESS_CODE: u16 = 200;

const RESULT_PREFIX: &str = "result=";

/// Fields of a reply whose status code was 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReply {
    pub code: u16,
    /// `None` when the reply carried no parsable result (`200 result=`).
    pub result: Option<i64>,
    pub data: Option<String>,
}

impl DecodedReply {
    /// The result interpreted as a character code, e.g. `49` as `'1'`.
    pub fn result_char(&self) -> Option<char> {
        self.result
            .and_then(|result| u32::try_from(result).ok())
            .and_then(char::from_u32)
    }
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status 200, whether or not the result parsed.
    Success(DecodedReply),
    /// Any other status code; no result or data is decoded.
    Failure(u16),
    /// The reply did not start with a numeric status code. Holds the raw
    /// reply text.
    Malformed(String),
}

impl Reply {
    pub fn code(&self) -> Option<u16> {
        match self {
            Reply::Success(decoded) => Some(decoded.code),
            Reply::Failure(code) => Some(*code),
            Reply::Malformed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn decoded(&self) -> Option<&DecodedReply> {
        match self {
            Reply::Success(decoded) => Some(decoded),
            _ => None,
        }
    }
}

/// Decode an assembled raw reply.
pub fn decode_reply(raw: &str) -> Reply {
    let code = match raw.get(..3).and_then(|digits| digits.parse::<u16>().ok()) {
        Some(code) => code,
        None => return Reply::Malformed(raw.to_string()),
    };

    if code != SUCCESS_CODE {
        return Reply::Failure(code);
    }

    let rest = raw.get(4..).unwrap_or("");
    let rest = rest.strip_prefix(RESULT_PREFIX).unwrap_or(rest);
    let token = rest.split(' ').next().unwrap_or("");
    let result = parse_leading_int(token);

    let tokens: Vec<&str> = raw.split(' ').collect();
    let data = match tokens.as_slice() {
        [_, _, data] => Some(strip_enclosing(data)),
        _ => None,
    };

    Reply::Success(DecodedReply { code, result, data })
}

// Accepts an optional sign followed by digits and ignores whatever trails them.
fn parse_leading_int(token: &str) -> Option<i64> {
    let token = token.trim_start();
    let sign_len = usize::from(token.starts_with(|c: char| c == '-' || c == '+'));
    let digits = token[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    token[..sign_len + digits].parse().ok()
}

fn strip_enclosing(token: &str) -> String {
    let mut chars = token.chars();
    if chars.next().is_none() || chars.next_back().is_none() {
        return String::new();
    }
    chars.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_result_and_data() {
        assert_eq!(
            decode_reply("200 result=49 (abcd)"),
            Reply::Success(DecodedReply {
                code: 200,
                result: Some(49),
                data: Some("abcd".to_string()),
            })
        );
    }

    #[test]
    fn decodes_result_without_data() {
        assert_eq!(
            decode_reply("200 result=0"),
            Reply::Success(DecodedReply {
                code: 200,
                result: Some(0),
                data: None,
            })
        );
    }

    #[test]
    fn non_200_yields_only_code() {
        assert_eq!(decode_reply("510 Invalid or unknown command"), Reply::Failure(510));
        assert_eq!(decode_reply("510 Invalid"), Reply::Failure(510));
    }

    #[test]
    fn unparsable_code_is_malformed() {
        assert_eq!(
            decode_reply("hello world"),
            Reply::Malformed("hello world".to_string())
        );
        assert_eq!(decode_reply(""), Reply::Malformed(String::new()));
        assert_eq!(decode_reply("20"), Reply::Malformed("20".to_string()));
    }

    #[test]
    fn missing_result_is_still_success() {
        for raw in ["200", "200 result=", "200 result=abc"] {
            let reply = decode_reply(raw);
            assert!(reply.is_success(), "{raw:?} should decode as success");
            assert_eq!(reply.decoded().and_then(|d| d.result), None);
            assert_eq!(reply.decoded().and_then(|d| d.result_char()), None);
        }
    }

    #[test]
    fn negative_result_is_kept() {
        let reply = decode_reply("200 result=-1");
        assert_eq!(reply.decoded().and_then(|d| d.result), Some(-1));
    }

    #[test]
    fn more_than_three_tokens_drops_data() {
        let reply = decode_reply("200 result=1 (timeout) endpos=1234");
        let decoded = reply.decoded().unwrap();
        assert_eq!(decoded.result, Some(1));
        assert_eq!(decoded.data, None);
    }

    #[test]
    fn data_keeps_interior_of_third_token() {
        let reply = decode_reply("200 result=1 endpos=1234");
        assert_eq!(
            reply.decoded().unwrap().data.as_deref(),
            Some("ndpos=123")
        );
    }

    #[test]
    fn result_char_maps_dtmf_codes() {
        let reply = decode_reply("200 result=35");
        assert_eq!(reply.decoded().unwrap().result_char(), Some('#'));
        let reply = decode_reply("200 result=-1");
        assert_eq!(reply.decoded().unwrap().result_char(), None);
    }

    #[test]
    fn reply_accessors() {
        assert_eq!(Reply::Failure(511).code(), Some(511));
        assert!(!Reply::Failure(511).is_success());
        assert_eq!(Reply::Malformed("x".to_string()).code(), None);
        assert!(decode_reply("200 result=0").is_success());
    }
}
