use fxhash::FxHashMap;

///
/// Create a label-to-position hash-map from an id vector.
///
/// Built once per axis so label lookups stay constant-time; on duplicate
/// labels the first occurrence wins.
///
/// # Arguments:
/// - labels: the axis id vector
pub fn build_index_map(labels: &[String]) -> FxHashMap<&str, usize> {
    let mut map: FxHashMap<&str, usize> = FxHashMap::default();
    for (i, label) in labels.iter().enumerate() {
        map.entry(label.as_str()).or_insert(i);
    }
    map
}

/// Labels occurring more than once, in first-occurrence order.
pub fn duplicate_labels(labels: &[String]) -> Vec<String> {
    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    let mut duplicates: Vec<String> = Vec::new();
    for label in labels {
        let count = seen.entry(label.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(label.clone());
        }
    }
    duplicates
}

/// Float equality under an absolute + relative tolerance. Two NaNs compare
/// equal so missing cells don't break symmetry and round-trip checks.
pub fn float_eq(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    (a - b).abs() <= 1e-12 + 1e-8 * a.abs().max(b.abs())
}
