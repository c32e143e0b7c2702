use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// One structured log entry: string keys mapped to arbitrary JSON values.
///
/// No schema is enforced. Every record is written as a single JSON object
/// followed by `\n`.
pub type Record = Map<String, Value>;

/// Build a [`Record`] from `key => value` pairs.
///
/// Values go through `Into<serde_json::Value>`, so integers, strings, bools,
/// vectors and nested records all work. Non-finite floats become `null`.
///
/// ```
/// use rotating_jsonlog::record;
///
/// let r = record! { "Time" => 1, "Msg" => "a" };
/// assert_eq!(r["Msg"], "a");
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::record::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut r = $crate::record::Record::new();
        $(
            r.insert(
                ::std::string::String::from($key),
                ::std::convert::Into::<$crate::__private::serde_json::Value>::into($value),
            );
        )+
        r
    }};
}

/// Record shape used by the level bridge:
/// `{"Time": <unix nanos>, "Type": <level>, "Message": <msg>, "Data": {..}}`.
///
/// `Data` is omitted when there are no extra fields.
pub fn level_record(
    time: DateTime<Utc>,
    level: &str,
    message: impl Into<String>,
    data: Map<String, Value>,
) -> Record {
    let mut r = Record::new();
    // Out-of-range timestamps (beyond year 2262) fall back to milliseconds.
    let time = match time.timestamp_nanos_opt() {
        Some(nanos) => Value::from(nanos),
        None => Value::from(time.timestamp_millis()),
    };
    r.insert("Time".to_string(), time);
    r.insert("Type".to_string(), Value::from(level));
    r.insert("Message".to_string(), Value::String(message.into()));
    if !data.is_empty() {
        r.insert("Data".to_string(), Value::Object(data));
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_macro_builds_map() {
        let r = crate::record! { "Time" => 1, "Msg" => "a", "Ok" => true };
        assert_eq!(r.len(), 3);
        assert_eq!(r["Time"], 1);
        assert_eq!(r["Msg"], "a");
        assert_eq!(r["Ok"], true);
    }

    #[test]
    fn record_macro_maps_nan_to_null() {
        let r = crate::record! { "x" => f64::NAN };
        assert!(r["x"].is_null());
    }

    #[test]
    fn level_record_omits_empty_data() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let r = level_record(t, "info", "hello", Map::new());
        assert_eq!(r["Type"], "info");
        assert_eq!(r["Message"], "hello");
        assert_eq!(r["Time"], t.timestamp_nanos_opt().unwrap());
        assert!(!r.contains_key("Data"));
    }

    #[test]
    fn level_record_keeps_fields_under_data() {
        let mut data = Map::new();
        data.insert("user_id".into(), Value::from(42));
        let r = level_record(Utc::now(), "error", "boom", data);
        assert_eq!(r["Data"]["user_id"], 42);
    }
}
