//! 数值/文本宽松转换，无法识别的值一律视为缺失

use serde_json::Value;

/// 数据源用 `-` 表示停牌或无数据
fn is_placeholder(s: &str) -> bool {
    matches!(s, "" | "-" | "--" | "null" | "None")
}

pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if is_placeholder(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

pub fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| parse_number(s).map(|v| v.round() as i64))
        }
        _ => None,
    }
}

pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!is_placeholder(s)).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 数量字段按手返回，换算为股
pub fn lots_to_shares(v: Option<f64>) -> Option<f64> {
    v.map(|lots| lots * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_numeric_becomes_none() {
        assert_eq!(number(Some(&json!(12.5))), Some(12.5));
        assert_eq!(number(Some(&json!("3.2"))), Some(3.2));
        assert_eq!(number(Some(&json!("-"))), None);
        assert_eq!(number(Some(&json!("abc"))), None);
        assert_eq!(number(Some(&json!(null))), None);
        assert_eq!(number(None), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_integer_and_text() {
        assert_eq!(integer(Some(&json!(3))), Some(3));
        assert_eq!(integer(Some(&json!("12"))), Some(12));
        assert_eq!(text(Some(&json!(19950517))).as_deref(), Some("19950517"));
        assert_eq!(text(Some(&json!("-"))), None);
    }
}
