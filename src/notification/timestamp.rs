use serde_json::Value;

/// Server timestamps come back as either integer or float JSON numbers.
/// Both become epoch millis; floats are truncated.
pub fn normalize(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };

    n.as_i64()
        .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
        .or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        })
}
