/// Dense descending ranks: the largest value gets 1, equal values share a
/// rank and the next distinct value gets the following integer. Missing and
/// NaN values get no rank.
pub fn dense_rank_descending(values: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut distinct: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();

    values
        .iter()
        .map(|value| {
            let v = (*value).filter(|v| !v.is_nan())?;
            distinct.iter().position(|&d| d == v).map(|pos| pos + 1)
        })
        .collect()
}
