use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Order two attribute values. Numbers compare numerically (numeric strings
/// are parsed when the other side is a number), strings lexically, booleans
/// with `false < true`. Anything else is only comparable when equal.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
        (Value::Number(na), Value::Number(nb)) => cmp_numbers(na, nb),
        (Value::Bool(ba), Value::Bool(bb)) => Some(ba.cmp(bb)),
        (Value::Number(na), Value::String(sb)) => {
            let db = sb.parse::<f64>().ok()?;
            cmp_f64(na.as_f64()?, db)
        }
        (Value::String(sa), Value::Number(nb)) => {
            let da = sa.parse::<f64>().ok()?;
            cmp_f64(da, nb.as_f64()?)
        }
        _ => (a == b).then_some(Ordering::Equal),
    }
}

pub fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

// Integers compare exactly; f64 would merge values above 2^53.
fn cmp_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (a.as_i64(), b.as_i64(), a.as_u64(), b.as_u64()) {
        (Some(ia), Some(ib), _, _) => Some(ia.cmp(&ib)),
        (_, _, Some(ua), Some(ub)) => Some(ua.cmp(&ub)),
        // one side negative, the other beyond i64::MAX
        (Some(_), None, _, Some(_)) => Some(Ordering::Less),
        (None, Some(_), Some(_), _) => Some(Ordering::Greater),
        _ => cmp_f64(a.as_f64()?, b.as_f64()?),
    }
}

fn cmp_f64(a: f64, b: f64) -> Option<Ordering> {
    if (a - b).abs() < f64::EPSILON {
        Some(Ordering::Equal)
    } else {
        a.partial_cmp(&b)
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
